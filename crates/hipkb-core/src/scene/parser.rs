//! Line-oriented node stanza parser.
//!
//! Two states: walking the top of an entry, or inside a `parm { ... }`
//! stanza. No lookahead beyond the current line; damage is contained by
//! dropping the construct being built and carrying on.

use super::{category, header, value, Connection, Node, Parameter, Scene};
use crate::archive::ArchiveEntry;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^type\s*=\s*(\S+)").expect("type regex must compile"));

static NODE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^name\s*=?\s*(\S+)").expect("node name regex must compile"));

static FLAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^flags\s*=\s*(.+)").expect("flags regex must compile"));

static PARM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^name\s+(\S+)").expect("parm name regex must compile"));

static PARM_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:default)?\s*value\s+(.+)").expect("parm value regex must compile")
});

static PARM_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^expression\s+(.+)").expect("expression regex must compile"));

static PARM_CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^channel\s+(\S+)").expect("channel regex must compile"));

/// Parse text entries into a Scene. Never fails; damage yields partial data.
pub(super) fn parse_entries(entries: &[ArchiveEntry]) -> Scene {
    let mut scene = Scene::default();

    let mut header_text = String::new();
    let mut node_entries: Vec<(&ArchiveEntry, String)> = Vec::new();
    for entry in entries {
        let normalized = normalize_name(&entry.name);
        if header::is_header_name(&normalized) {
            header_text.push_str(&String::from_utf8_lossy(&entry.data));
            header_text.push('\n');
        } else {
            node_entries.push((entry, normalized));
        }
    }

    if let Some(version) = header::find_version(&header_text) {
        scene.hip_version = version;
    }
    if let Some(save_time) = header::find_save_time(&header_text) {
        scene.save_time = save_time;
    }
    header::collect_metadata(&header_text, &mut scene.metadata);

    for (entry, normalized) in &node_entries {
        parse_node_entry(entry, normalized, &mut scene);
    }

    // Some archives only record the version inside node entries.
    if scene.hip_version.is_empty() {
        for (entry, _) in &node_entries {
            if let Some(version) = header::find_version(&String::from_utf8_lossy(&entry.data)) {
                scene.hip_version = version;
                break;
            }
        }
    }

    scene
}

/// In-progress `parm { ... }` stanza.
struct ParmState {
    depth: i32,
    param: Parameter,
}

fn parse_node_entry(entry: &ArchiveEntry, normalized: &str, scene: &mut Scene) {
    let base = format!("/{normalized}");
    let text = String::from_utf8_lossy(&entry.data);

    let mut current: Option<Node> = None;
    let mut parm: Option<ParmState> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();

        if let Some(state) = parm.as_mut() {
            let opens = line.matches('{').count() as i32;
            let closes = line.matches('}').count() as i32;
            state.depth += opens - closes;

            if state.depth <= 0 {
                let finished = parm.take().expect("parm state present");
                if !finished.param.name.is_empty() {
                    if let Some(node) = current.as_mut() {
                        node.parameters.push(finished.param);
                    }
                }
                continue;
            }

            if let Some(caps) = PARM_NAME_RE.captures(line) {
                state.param.name = caps[1].to_string();
            } else if let Some(caps) = PARM_EXPR_RE.captures(line) {
                state.param.set_expression(caps[1].trim());
            } else if line.contains("parmdef") || line.contains("default {") {
                state.param.is_default = false;
            } else if let Some(caps) = PARM_VALUE_RE.captures(line) {
                state.param.value = value::coerce(&caps[1]);
            } else if let Some(caps) = PARM_CHANNEL_RE.captures(line) {
                state.param.channel_ref = Some(caps[1].to_string());
            }
            continue;
        }

        if let Some(caps) = TYPE_RE.captures(line) {
            flush_node(&mut current, scene);
            let node_type = caps[1].to_string();
            let node_category = category::infer(&node_type, &base);
            current = Some(Node {
                name: last_segment(&base).to_string(),
                path: base.clone(),
                node_type,
                category: node_category,
                parameters: Vec::new(),
                flags: BTreeMap::new(),
            });
        } else if line == "parm {" || line == "parm\t{" {
            parm = Some(ParmState {
                depth: 1,
                param: Parameter::default(),
            });
        } else if line.starts_with("wire ") || line.starts_with("input ") {
            if let Some(connection) = parse_connection(line, &base) {
                scene.connections.push(connection);
            }
        } else if let Some(caps) = FLAGS_RE.captures(line) {
            if let Some(node) = current.as_mut() {
                parse_flags(&caps[1], &mut node.flags);
            }
        } else if let Some(caps) = NODE_NAME_RE.captures(line) {
            if let Some(node) = current.as_mut() {
                node.name = caps[1].to_string();
                node.path = format!("{base}/{}", node.name);
            }
        }
    }

    // An unterminated parm stanza at end of entry is dropped.
    flush_node(&mut current, scene);
}

fn flush_node(current: &mut Option<Node>, scene: &mut Scene) {
    if let Some(node) = current.take() {
        if !node.node_type.is_empty() {
            scene.nodes.push(node);
        }
    }
}

/// `wire <from> <fromOut> <to> <toIn>` or `input <toIn> <from> <fromOut>`;
/// anything else is dropped.
fn parse_connection(line: &str, base: &str) -> Option<Connection> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["wire", from, from_out, to, to_in] => Some(Connection {
            from_path: resolve(base, from),
            from_output: from_out.parse().ok()?,
            to_path: resolve(base, to),
            to_input: to_in.parse().ok()?,
        }),
        ["input", to_in, from, from_out] => Some(Connection {
            from_path: resolve(base, from),
            from_output: from_out.parse().ok()?,
            to_path: base.to_string(),
            to_input: to_in.parse().ok()?,
        }),
        _ => None,
    }
}

fn resolve(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

fn parse_flags(raw: &str, flags: &mut BTreeMap<String, bool>) {
    for token in raw.split_whitespace() {
        match token.split_once('=') {
            Some((key, val)) => {
                flags.insert(key.to_string(), matches!(val, "1" | "on" | "true"));
            }
            None => {
                flags.insert(token.to_string(), true);
            }
        }
    }
}

fn normalize_name(raw: &str) -> String {
    let slashes = raw.replace('\\', "/");
    let stripped = slashes
        .strip_prefix("./")
        .or_else(|| slashes.strip_prefix('/'))
        .unwrap_or(&slashes);
    stripped.to_string()
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeCategory, ParamValue};

    fn entry(name: &str, body: &str) -> ArchiveEntry {
        ArchiveEntry {
            name: name.into(),
            mode: 0o100644,
            size: body.len() as u32,
            data: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_two_parameter_pyro_node() {
        let body = "type = pyrosolver::2.0\nname = pyro_solver1\nparm {\n  name dissipation\n  value 0.05\n}\nparm {\n  name cooling_rate\n  value 0.3\n  parmdef\n}\n";
        let scene = parse_entries(&[entry("obj/geo1/pyro_solver1", body)]);

        assert_eq!(scene.nodes.len(), 1);
        let node = &scene.nodes[0];
        assert_eq!(node.path, "/obj/geo1/pyro_solver1/pyro_solver1");
        assert_eq!(node.node_type, "pyrosolver::2.0");
        assert_eq!(node.category, NodeCategory::Dop);
        assert_eq!(node.parameters.len(), 2);

        assert_eq!(node.parameters[0].name, "dissipation");
        assert_eq!(node.parameters[0].value, ParamValue::Float(0.05));
        assert!(node.parameters[0].is_default);

        assert_eq!(node.parameters[1].name, "cooling_rate");
        assert_eq!(node.parameters[1].value, ParamValue::Float(0.3));
        assert!(!node.parameters[1].is_default);
    }

    #[test]
    fn test_wire_connection() {
        let body = "type = merge\nname = merge1\nwire /obj/geo1/a 0 /obj/geo1/merge1 1\n";
        let scene = parse_entries(&[entry("obj/geo1/merge", body)]);

        assert_eq!(scene.connections.len(), 1);
        let conn = &scene.connections[0];
        assert_eq!(conn.from_path, "/obj/geo1/a");
        assert_eq!(conn.from_output, 0);
        assert_eq!(conn.to_path, "/obj/geo1/merge1");
        assert_eq!(conn.to_input, 1);
    }

    #[test]
    fn test_input_connection_targets_base_path() {
        let body = "type = copy\ninput 2 source 0\n";
        let scene = parse_entries(&[entry("obj/geo1/copy1", body)]);

        assert_eq!(scene.connections.len(), 1);
        let conn = &scene.connections[0];
        assert_eq!(conn.from_path, "/obj/geo1/copy1/source");
        assert_eq!(conn.to_path, "/obj/geo1/copy1");
        assert_eq!(conn.to_input, 2);
    }

    #[test]
    fn test_malformed_connection_is_dropped() {
        let body = "type = merge\nwire onlythree tokens here\nwire a b c d\n";
        let scene = parse_entries(&[entry("obj/m", body)]);
        // Both lines have unparseable indices.
        assert!(scene.connections.is_empty());
        assert_eq!(scene.nodes.len(), 1);
    }

    #[test]
    fn test_flags_tokens() {
        let body = "type = box\nflags = display=1 render=on template=0 locked\n";
        let scene = parse_entries(&[entry("obj/geo1/box1", body)]);

        let flags = &scene.nodes[0].flags;
        assert_eq!(flags.get("display"), Some(&true));
        assert_eq!(flags.get("render"), Some(&true));
        assert_eq!(flags.get("template"), Some(&false));
        assert_eq!(flags.get("locked"), Some(&true));
    }

    #[test]
    fn test_expression_clears_default() {
        let body = "type = xform\nparm {\n  name tx\n  value 0\n  expression $F * 0.1\n}\n";
        let scene = parse_entries(&[entry("obj/geo1/xform1", body)]);

        let param = &scene.nodes[0].parameters[0];
        assert_eq!(param.expression.as_deref(), Some("$F * 0.1"));
        assert!(!param.is_default);
    }

    #[test]
    fn test_nested_default_block_marks_modified() {
        let body = "type = xform\nparm {\n  name ty\n  value 1.5\n  default {\n    0\n  }\n}\n";
        let scene = parse_entries(&[entry("obj/geo1/xform1", body)]);

        let param = &scene.nodes[0].parameters[0];
        assert_eq!(param.name, "ty");
        assert!(!param.is_default);
        assert_eq!(param.value, ParamValue::Float(1.5));
    }

    #[test]
    fn test_nameless_parm_is_dropped() {
        let body = "type = box\nparm {\n  value 3\n}\n";
        let scene = parse_entries(&[entry("obj/geo1/box1", body)]);
        assert!(scene.nodes[0].parameters.is_empty());
    }

    #[test]
    fn test_unterminated_parm_is_dropped() {
        let body = "type = box\nparm {\n  name scale\n  value 2\n";
        let scene = parse_entries(&[entry("obj/geo1/box1", body)]);
        assert!(scene.nodes[0].parameters.is_empty());
    }

    #[test]
    fn test_multiple_nodes_in_one_entry() {
        let body = "type = box\nname = box1\ntype = sphere\nname = sphere1\n";
        let scene = parse_entries(&[entry("obj/geo1/shapes", body)]);

        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.nodes[0].node_type, "box");
        assert_eq!(scene.nodes[0].path, "/obj/geo1/shapes/box1");
        assert_eq!(scene.nodes[1].node_type, "sphere");
        assert_eq!(scene.nodes[1].path, "/obj/geo1/shapes/sphere1");
    }

    #[test]
    fn test_header_metadata_and_version() {
        let hip = entry(".hip", "houdini_version = \"20.5.332\"\n_HIP_SAVETIME = \"Wed Mar  5 2025\"\nrenderer = karma\n");
        let node = entry("obj/geo1/box1", "type = box\n");
        let scene = parse_entries(&[hip, node]);

        assert_eq!(scene.hip_version, "20.5.332");
        assert_eq!(scene.save_time, "Wed Mar  5 2025");
        assert_eq!(scene.metadata.get("renderer").map(String::as_str), Some("karma"));
        assert_eq!(scene.nodes.len(), 1);
    }

    #[test]
    fn test_version_fallback_scans_node_entries() {
        let node = entry("obj/geo1/box1", "type = box\n_HIP_SAVEVERSION = 19.5.303\n");
        let scene = parse_entries(&[node]);
        assert_eq!(scene.hip_version, "19.5.303");
    }

    #[test]
    fn test_backslash_and_dot_prefixes_normalize() {
        let scene = parse_entries(&[entry(".\\obj\\geo1\\box1", "type = box\n")]);
        assert_eq!(scene.nodes[0].path, "/obj/geo1/box1");
    }

    #[test]
    fn test_every_node_path_is_absolute() {
        let bodies = [
            ("obj/geo1/a", "type = box\nname = a\n"),
            ("./obj/geo1/b", "type = sphere\n"),
            ("/obj/geo1/c", "type = tube\n"),
        ];
        let entries: Vec<ArchiveEntry> =
            bodies.iter().map(|(n, b)| entry(n, b)).collect();
        let scene = parse_entries(&entries);

        assert_eq!(scene.nodes.len(), 3);
        for node in &scene.nodes {
            assert!(node.path.starts_with('/'), "path {} not absolute", node.path);
            assert!(!node.parameters.iter().any(|p| p.name.is_empty()));
        }
    }
}
