//! Module defining the script node produced by the [parser][crate::parser] and
//! consumed by the [lowerer][crate::lower].

use std::fmt;

/// The category of a script node (or, after lowering, of a lowered instruction —
/// the two share this shape, see `crate::lower`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Label,
    Goto,
    IfCondition,
    ElseOpen,
    BlockClose,
    DoOpen,
    DoEnd,
    WhileCondition,
    Assignment,
    CommandRewrite,
    Command,
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Label => "Label",
            Self::Goto => "Goto",
            Self::IfCondition => "If_Condition",
            Self::ElseOpen => "Else_Open",
            Self::BlockClose => "Block_Close",
            Self::DoOpen => "Do_Open",
            Self::DoEnd => "Do_End",
            Self::WhileCondition => "While_Condition",
            Self::Assignment => "Assignment",
            Self::CommandRewrite => "Command_Rewrite",
            Self::Command => "Command",
        };
        f.write_str(s)
    }
}

/// An ordered script node: a category tag plus the already-formatted,
/// source-ish statement text carried along for the executor/command parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub category: NodeCategory,
    pub statement: String,
}

impl Node {
    #[must_use]
    pub fn new(category: NodeCategory, statement: impl Into<String>) -> Self {
        Self { category, statement: statement.into() }
    }
}
