//! Node category (Houdini context) inference.

use serde::{Deserialize, Serialize};

/// The Houdini context a node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    #[serde(rename = "OBJ")]
    Obj,
    #[serde(rename = "SOP")]
    Sop,
    #[serde(rename = "DOP")]
    Dop,
    #[serde(rename = "VOP")]
    Vop,
    #[serde(rename = "CHOP")]
    Chop,
    #[serde(rename = "COP")]
    Cop,
    #[serde(rename = "ROP")]
    Rop,
    #[serde(rename = "LOP")]
    Lop,
    #[serde(rename = "TOP")]
    Top,
}

impl NodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCategory::Obj => "OBJ",
            NodeCategory::Sop => "SOP",
            NodeCategory::Dop => "DOP",
            NodeCategory::Vop => "VOP",
            NodeCategory::Chop => "CHOP",
            NodeCategory::Cop => "COP",
            NodeCategory::Rop => "ROP",
            NodeCategory::Lop => "LOP",
            NodeCategory::Top => "TOP",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OBJ" => Some(NodeCategory::Obj),
            "SOP" => Some(NodeCategory::Sop),
            "DOP" => Some(NodeCategory::Dop),
            "VOP" => Some(NodeCategory::Vop),
            "CHOP" => Some(NodeCategory::Chop),
            "COP" => Some(NodeCategory::Cop),
            "ROP" => Some(NodeCategory::Rop),
            "LOP" => Some(NodeCategory::Lop),
            "TOP" => Some(NodeCategory::Top),
            _ => None,
        }
    }
}

impl Default for NodeCategory {
    fn default() -> Self {
        NodeCategory::Sop
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Simulation-flavored type substrings that force DOP regardless of where
/// the entry sits in the tree.
const DOP_TYPE_HINTS: [&str; 7] = ["pyro", "flip", "rbd", "vellum", "solver", "gas", "bullet"];

/// Infer a category from the node type and the entry filename.
///
/// Type hints win over path context; an unplaceable node defaults to SOP.
pub fn infer(node_type: &str, entry_name: &str) -> NodeCategory {
    let node_type = node_type.to_lowercase();
    let entry_name = entry_name.to_lowercase();

    if DOP_TYPE_HINTS.iter().any(|hint| node_type.contains(hint)) {
        return NodeCategory::Dop;
    }

    if entry_name.contains("/dop/") || entry_name.contains("dopnet") {
        return NodeCategory::Dop;
    }
    for (pattern, category) in [
        ("/sop/", NodeCategory::Sop),
        ("/vop/", NodeCategory::Vop),
        ("/chop/", NodeCategory::Chop),
        ("/cop/", NodeCategory::Cop),
        ("/rop/", NodeCategory::Rop),
        ("/lop/", NodeCategory::Lop),
        ("/top/", NodeCategory::Top),
        ("/obj/", NodeCategory::Obj),
    ] {
        if entry_name.contains(pattern) {
            return category;
        }
    }

    NodeCategory::Sop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hints_beat_path_context() {
        assert_eq!(infer("pyrosolver::2.0", "/obj/geo1/pyro_solver1"), NodeCategory::Dop);
        assert_eq!(infer("rbdbulletsolver", "/obj/sim/solver"), NodeCategory::Dop);
        assert_eq!(infer("gasresize", "/obj/x"), NodeCategory::Dop);
    }

    #[test]
    fn test_path_patterns() {
        assert_eq!(infer("merge", "/obj/geo1/dopnet1/merge1"), NodeCategory::Dop);
        assert_eq!(infer("add", "/x/sop/add1"), NodeCategory::Sop);
        assert_eq!(infer("multiply", "/mat/vop/multiply1"), NodeCategory::Vop);
        assert_eq!(infer("lag", "/x/chop/lag1"), NodeCategory::Chop);
        assert_eq!(infer("blur", "/img/cop/blur1"), NodeCategory::Cop);
        assert_eq!(infer("mantra", "/out/rop/mantra1"), NodeCategory::Rop);
        assert_eq!(infer("sphere", "/stage/lop/sphere1"), NodeCategory::Lop);
        assert_eq!(infer("ffmpeg", "/tasks/top/encode"), NodeCategory::Top);
    }

    #[test]
    fn test_obj_and_default() {
        assert_eq!(infer("geo", "/obj/geo1"), NodeCategory::Obj);
        assert_eq!(infer("mystery", "/somewhere/else"), NodeCategory::Sop);
    }

    #[test]
    fn test_wire_form_roundtrip() {
        for cat in [
            NodeCategory::Obj,
            NodeCategory::Sop,
            NodeCategory::Dop,
            NodeCategory::Vop,
            NodeCategory::Chop,
            NodeCategory::Cop,
            NodeCategory::Rop,
            NodeCategory::Lop,
            NodeCategory::Top,
        ] {
            assert_eq!(NodeCategory::from_str(cat.as_str()), Some(cat));
        }
    }

    #[test]
    fn test_serde_uses_wire_form() {
        assert_eq!(serde_json::to_string(&NodeCategory::Dop).unwrap(), "\"DOP\"");
    }
}
