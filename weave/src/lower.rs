//! Module implementing the lowerer: flattens parser [`Node`]s into a linear,
//! jump-addressable instruction list plus a label table.

use crate::ast::{Node, NodeCategory};
use crate::error::{WeaveError, WeaveResult};
use crate::value::Registry;
use std::collections::HashMap;

/// A lowered instruction. Same shape as a parser [`Node`]; produced in a flat,
/// index-addressable list.
pub type Instruction = Node;

/// For every `If_Condition`/`Do_End`/`While_Condition`, the index of its
/// matching `Else_Open`/`Block_Close`/`Do_Open`, enabling the executor to jump
/// directly instead of re-scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTarget(pub usize);

/// Whether assignments are rewritten into command calls or preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerMode {
    Rewrite,
    PreserveAssignments,
}

/// The result of lowering: the flat instruction list, the label table (user
/// labels plus synthetic block-boundary labels), and the match-target table
/// for block-structured instructions.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub instructions: Vec<Instruction>,
    pub labels: HashMap<String, usize>,
    /// Index of the instruction -> index of its matching boundary instruction.
    pub matches: HashMap<usize, usize>,
}

/// Does `text` look like a bare command call (`name(args)`), as opposed to an
/// arithmetic/logical expression? Used to pick between `Store` and
/// `EvaluateCommand` rewriting for an `Assignment` RHS.
fn looks_like_command_call(text: &str) -> bool {
    match text.find('(') {
        Some(open) if text.ends_with(')') => {
            let head = &text[..open];
            !head.is_empty()
                && head.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && head.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        }
        _ => false,
    }
}

struct Lowerer<'r> {
    mode: LowerMode,
    registry: Option<&'r Registry>,
    out: Vec<Instruction>,
    labels: HashMap<String, usize>,
    matches: HashMap<usize, usize>,
    synth_counter: usize,
}

impl<'r> Lowerer<'r> {
    fn new(mode: LowerMode, registry: Option<&'r Registry>) -> Self {
        Self {
            mode,
            registry,
            out: Vec::new(),
            labels: HashMap::new(),
            matches: HashMap::new(),
            synth_counter: 0,
        }
    }

    fn next_synth(&mut self, prefix: &str) -> String {
        self.synth_counter += 1;
        format!("__{}_{}", prefix, self.synth_counter)
    }

    fn push(&mut self, node: Instruction) -> usize {
        let idx = self.out.len();
        self.out.push(node);
        idx
    }

    /// Fold literal-constant arithmetic in `rhs` when a registry is available
    /// at lowering time (§4.5). Only whole-expression numeric folding is
    /// attempted; anything else is kept as text.
    fn fold_constants(&self, rhs: &str) -> String {
        if let Some(registry) = self.registry {
            let substituted = registry.replace_variables(rhs);
            if substituted.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
                return substituted;
            }
        }
        rhs.to_string()
    }

    fn lower_node(&mut self, node: &Node) -> WeaveResult<()> {
        match node.category {
            NodeCategory::Label => {
                if self.labels.contains_key(&node.statement) {
                    return Err(WeaveError::ErrorDuplicateLabel(
                        node.statement.clone(),
                        crate::lexer::Position::NONE,
                    ));
                }
                let idx = self.push(node.clone());
                self.labels.insert(node.statement.clone(), idx);
            }
            NodeCategory::Goto
            | NodeCategory::Command => {
                self.push(node.clone());
            }
            NodeCategory::Assignment => match self.mode {
                LowerMode::PreserveAssignments => {
                    self.push(node.clone());
                }
                LowerMode::Rewrite => {
                    let (key, rhs) = node
                        .statement
                        .split_once('=')
                        .ok_or_else(|| WeaveError::ErrorSyntax("malformed assignment".into(), crate::lexer::Position::NONE))?;
                    let rewritten = if looks_like_command_call(rhs) {
                        format!("Store({},{})", key, rhs)
                    } else {
                        let rhs = self.fold_constants(rhs);
                        format!("EvaluateCommand({}, {})", rhs, key)
                    };
                    self.push(Instruction::new(NodeCategory::CommandRewrite, rewritten));
                }
            },
            NodeCategory::IfCondition => {
                let if_idx = self.push(node.clone());
                // Body follows immediately; handled by caller's linear walk.
                let label = self.next_synth("if_start");
                self.labels.insert(label, if_idx + 1);
            }
            NodeCategory::ElseOpen => {
                let idx = self.push(node.clone());
                let label = self.next_synth("else_start");
                self.labels.insert(label, idx + 1);
            }
            NodeCategory::BlockClose => {
                let idx = self.push(node.clone());
                let label = self.next_synth("block_end");
                self.labels.insert(label, idx);
            }
            NodeCategory::DoOpen => {
                let idx = self.push(node.clone());
                let label = self.next_synth("do_start");
                self.labels.insert(label, idx);
            }
            NodeCategory::DoEnd => {
                let idx = self.push(node.clone());
                let label = self.next_synth("do_end");
                self.labels.insert(label, idx);
            }
            NodeCategory::WhileCondition => {
                self.push(node.clone());
            }
            NodeCategory::CommandRewrite => {
                self.push(node.clone());
            }
        }
        Ok(())
    }

    /// Second pass: link `If_Condition`/`Do_End` to their matching boundary
    /// instructions, and `While_Condition` back to its `Do_Open`.
    fn link_matches(&mut self) -> WeaveResult<()> {
        let mut if_stack: Vec<usize> = Vec::new();
        let mut else_stack: Vec<usize> = Vec::new();
        let mut do_stack: Vec<usize> = Vec::new();

        for (idx, instr) in self.out.iter().enumerate() {
            match instr.category {
                NodeCategory::IfCondition => if_stack.push(idx),
                NodeCategory::ElseOpen => {
                    let if_idx = if_stack.last().copied().ok_or_else(|| {
                        WeaveError::ErrorUnmatchedBlock("else without if".into(), crate::lexer::Position::NONE)
                    })?;
                    self.matches.insert(if_idx, idx);
                    else_stack.push(idx);
                }
                NodeCategory::BlockClose => {
                    if let Some(else_idx) = else_stack.pop() {
                        self.matches.insert(else_idx, idx);
                        if_stack.pop();
                    } else if let Some(if_idx) = if_stack.pop() {
                        self.matches.entry(if_idx).or_insert(idx);
                    } else {
                        return Err(WeaveError::ErrorUnmatchedBlock(
                            "Block_Close without matching If_Condition".into(),
                            crate::lexer::Position::NONE,
                        ));
                    }
                }
                NodeCategory::DoOpen => do_stack.push(idx),
                NodeCategory::DoEnd => {
                    let do_idx = do_stack.pop().ok_or_else(|| {
                        WeaveError::ErrorUnmatchedBlock("Do_End without Do_Open".into(), crate::lexer::Position::NONE)
                    })?;
                    self.matches.insert(idx, do_idx);
                }
                NodeCategory::WhileCondition => {
                    let prev = idx.checked_sub(1);
                    match prev.map(|p| &self.out[p].category) {
                        Some(NodeCategory::DoEnd) => {}
                        _ => {
                            return Err(WeaveError::ErrorUnmatchedBlock(
                                "While_Condition must immediately follow Do_End".into(),
                                crate::lexer::Position::NONE,
                            ))
                        }
                    }
                }
                _ => {}
            }
        }

        if !if_stack.is_empty() {
            return Err(WeaveError::ErrorUnmatchedBlock(
                "If_Condition without matching Block_Close".into(),
                crate::lexer::Position::NONE,
            ));
        }
        if !do_stack.is_empty() {
            return Err(WeaveError::ErrorUnmatchedBlock(
                "Do_Open without matching Do_End".into(),
                crate::lexer::Position::NONE,
            ));
        }
        Ok(())
    }
}

/// Lower a parsed node sequence, optionally folding literal constants against
/// `registry` (§4.5). Returns a lowering error on block/label mismatches.
pub fn lower(nodes: &[Node], mode: LowerMode, registry: Option<&Registry>) -> WeaveResult<Lowered> {
    let mut lowerer = Lowerer::new(mode, registry);
    for node in nodes {
        lowerer.lower_node(node)?;
    }
    lowerer.link_matches()?;
    Ok(Lowered { instructions: lowerer.out, labels: lowerer.labels, matches: lowerer.matches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn rewrites_expression_assignment_to_evaluate_command() {
        let nodes = parse("x = 2+3;").unwrap();
        let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
        let stmt = &lowered.instructions[0].statement;
        assert_eq!(lowered.instructions[0].category, NodeCategory::CommandRewrite);
        assert!(stmt.contains("EvaluateCommand("));
        assert!(stmt.contains("2+3"));
        assert!(stmt.contains(", x"));
    }

    #[test]
    fn rewrites_command_assignment_to_store() {
        let nodes = parse("x = getValue(score);").unwrap();
        let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
        let stmt = &lowered.instructions[0].statement;
        assert!(stmt.contains("Store(x"));
        assert!(stmt.contains("getValue("));
    }

    #[test]
    fn preserve_mode_keeps_assignment_node() {
        let nodes = parse("x = 1;").unwrap();
        let lowered = lower(&nodes, LowerMode::PreserveAssignments, None).unwrap();
        assert_eq!(lowered.instructions[0].category, NodeCategory::Assignment);
    }

    #[test]
    fn duplicate_label_is_a_lowering_error() {
        let nodes = parse("label a; label a;").unwrap();
        assert!(lower(&nodes, LowerMode::Rewrite, None).is_err());
    }

    #[test]
    fn if_without_block_close_is_rejected_at_parse_time() {
        // the parser itself enforces balanced braces; lowering only re-checks
        // the category-level invariant once nodes are already well-formed.
        let nodes = parse("if(true){ Print(\"x\"); }").unwrap();
        assert!(lower(&nodes, LowerMode::Rewrite, None).is_ok());
    }

    #[test]
    fn links_if_else_and_do_while_matches() {
        let nodes = parse("if(true){ Print(\"a\"); } else { Print(\"b\"); }").unwrap();
        let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
        // If_Condition (0) -> Else_Open (2)
        assert_eq!(lowered.matches.get(&0), Some(&2));

        let nodes2 = parse("do { Print(\"a\"); } while(true);").unwrap();
        let lowered2 = lower(&nodes2, LowerMode::Rewrite, None).unwrap();
        // Do_End (2) -> Do_Open (0)
        assert_eq!(lowered2.matches.get(&2), Some(&0));
    }
}
