//! # Semantic Contexts
//!
//! Predicate guards collected on configurations during SLL prediction.
//! Predicates are combined with `and`/`or` while configurations merge and
//! are evaluated only when a DFA accept state needs them.

use std::fmt;
use std::sync::Arc;

use crate::context::RuleContext;
use crate::recognizer::Recognizer;

/// Guard on a configuration
///
/// Operands of `And`/`Or` are kept sorted and deduplicated so equal guards
/// compare equal regardless of how they were built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SemanticContext {
    /// Always true
    #[default]
    None,
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    /// `{precedence >= _p}`
    Precedence { precedence: i32 },
    And(Arc<[SemanticContext]>),
    Or(Arc<[SemanticContext]>),
}

impl SemanticContext {
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Conjunction, reducing precedence predicates to the lowest level
    #[must_use]
    pub fn and(a: &Self, b: &Self) -> Self {
        if a.is_none() {
            return b.clone();
        }
        if b.is_none() || a == b {
            return a.clone();
        }
        let mut operands = Vec::new();
        collect_operands(a, &mut operands, |s| matches!(s, Self::And(_)));
        collect_operands(b, &mut operands, |s| matches!(s, Self::And(_)));
        let min_precedence = operands
            .iter()
            .filter_map(Self::precedence_level)
            .min();
        Self::combine(operands, min_precedence, Self::And)
    }

    /// Disjunction, reducing precedence predicates to the highest level
    #[must_use]
    pub fn or(a: &Self, b: &Self) -> Self {
        if a.is_none() || b.is_none() {
            return Self::None;
        }
        if a == b {
            return a.clone();
        }
        let mut operands = Vec::new();
        collect_operands(a, &mut operands, |s| matches!(s, Self::Or(_)));
        collect_operands(b, &mut operands, |s| matches!(s, Self::Or(_)));
        let max_precedence = operands
            .iter()
            .filter_map(Self::precedence_level)
            .max();
        Self::combine(operands, max_precedence, Self::Or)
    }

    fn combine(
        mut operands: Vec<Self>,
        kept_precedence: Option<i32>,
        build: fn(Arc<[Self]>) -> Self,
    ) -> Self {
        operands.retain(|s| !matches!(s, Self::Precedence { .. }));
        if let Some(precedence) = kept_precedence {
            operands.push(Self::Precedence { precedence });
        }
        operands.sort();
        operands.dedup();
        if operands.len() == 1 {
            return operands.pop().unwrap_or_default();
        }
        build(operands.into())
    }

    const fn precedence_level(&self) -> Option<i32> {
        match self {
            Self::Precedence { precedence } => Some(*precedence),
            _ => None,
        }
    }

    /// Evaluate against the parser's current invocation stack
    pub fn eval(
        &self,
        recognizer: &mut dyn Recognizer,
        outer: Option<&Arc<RuleContext>>,
    ) -> bool {
        match self {
            Self::None => true,
            Self::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => {
                let local = if *is_ctx_dependent { outer } else { None };
                recognizer.sempred(local, *rule_index, *pred_index)
            }
            Self::Precedence { precedence } => recognizer.precpred(outer, *precedence),
            Self::And(operands) => operands.iter().all(|op| op.eval(recognizer, outer)),
            Self::Or(operands) => operands.iter().any(|op| op.eval(recognizer, outer)),
        }
    }

    /// Partially evaluate precedence predicates
    ///
    /// Returns `None` when the guard is certainly false, [`SemanticContext::None`]
    /// when it is certainly true, otherwise the remaining guard with every
    /// precedence predicate resolved.
    pub fn eval_precedence(
        &self,
        recognizer: &mut dyn Recognizer,
        outer: Option<&Arc<RuleContext>>,
    ) -> Option<Self> {
        match self {
            Self::None | Self::Predicate { .. } => Some(self.clone()),
            Self::Precedence { precedence } => {
                recognizer.precpred(outer, *precedence).then_some(Self::None)
            }
            Self::And(operands) => {
                let mut differs = false;
                let mut result = Self::None;
                for operand in operands.iter() {
                    let evaluated = operand.eval_precedence(recognizer, outer)?;
                    differs |= &evaluated != operand;
                    result = Self::and(&result, &evaluated);
                }
                Some(if differs { result } else { self.clone() })
            }
            Self::Or(operands) => {
                let mut differs = false;
                let mut result: Option<Self> = None;
                for operand in operands.iter() {
                    let evaluated = operand.eval_precedence(recognizer, outer);
                    differs |= evaluated.as_ref() != Some(operand);
                    match evaluated {
                        Some(Self::None) => return Some(Self::None),
                        Some(evaluated) => {
                            result = Some(match result {
                                Some(acc) => Self::or(&acc, &evaluated),
                                None => evaluated,
                            });
                        }
                        None => {}
                    }
                }
                if differs {
                    result
                } else {
                    Some(self.clone())
                }
            }
        }
    }
}

fn collect_operands(
    context: &SemanticContext,
    out: &mut Vec<SemanticContext>,
    same_kind: fn(&SemanticContext) -> bool,
) {
    match context {
        SemanticContext::And(operands) | SemanticContext::Or(operands) if same_kind(context) => {
            out.extend(operands.iter().cloned());
        }
        other => out.push(other.clone()),
    }
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("true"),
            Self::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "{{{rule_index}:{pred_index}}}?"),
            Self::Precedence { precedence } => write!(f, "{{{precedence}>=prec}}?"),
            Self::And(operands) | Self::Or(operands) => {
                let separator = if matches!(self, Self::And(_)) { "&&" } else { "||" };
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(separator)?;
                    }
                    write!(f, "{operand}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(pred_index: usize) -> SemanticContext {
        SemanticContext::Predicate {
            rule_index: 0,
            pred_index,
            is_ctx_dependent: false,
        }
    }

    struct Levels {
        precedence: i32,
        false_preds: Vec<usize>,
    }

    impl Recognizer for Levels {
        fn sempred(&mut self, _: Option<&Arc<RuleContext>>, _: usize, pred_index: usize) -> bool {
            !self.false_preds.contains(&pred_index)
        }

        fn precpred(&mut self, _: Option<&Arc<RuleContext>>, precedence: i32) -> bool {
            precedence >= self.precedence
        }
    }

    #[test]
    fn test_and_with_none_is_identity() {
        let p = pred(1);
        assert_eq!(SemanticContext::and(&SemanticContext::None, &p), p);
        assert_eq!(SemanticContext::or(&SemanticContext::None, &p), SemanticContext::None);
    }

    #[test]
    fn test_operands_are_order_independent() {
        let ab = SemanticContext::and(&pred(1), &pred(2));
        let ba = SemanticContext::and(&pred(2), &pred(1));
        assert_eq!(ab, ba);
        let nested = SemanticContext::and(&ab, &pred(1));
        assert_eq!(nested, ab);
    }

    #[test]
    fn test_precedence_reduction() {
        let p2 = SemanticContext::Precedence { precedence: 2 };
        let p5 = SemanticContext::Precedence { precedence: 5 };
        assert_eq!(SemanticContext::and(&p2, &p5), p2);
        assert_eq!(SemanticContext::or(&p2, &p5), p5);
    }

    #[test]
    fn test_eval() {
        let mut recognizer = Levels {
            precedence: 3,
            false_preds: vec![2],
        };
        assert!(SemanticContext::and(&pred(1), &pred(3)).eval(&mut recognizer, None));
        assert!(!SemanticContext::and(&pred(1), &pred(2)).eval(&mut recognizer, None));
        assert!(SemanticContext::or(&pred(1), &pred(2)).eval(&mut recognizer, None));
    }

    #[test]
    fn test_eval_precedence() {
        let mut recognizer = Levels {
            precedence: 3,
            false_preds: Vec::new(),
        };
        let high = SemanticContext::Precedence { precedence: 4 };
        let low = SemanticContext::Precedence { precedence: 1 };
        assert_eq!(
            high.eval_precedence(&mut recognizer, None),
            Some(SemanticContext::None)
        );
        assert_eq!(low.eval_precedence(&mut recognizer, None), None);

        let guarded = SemanticContext::and(&high, &pred(1));
        assert_eq!(guarded.eval_precedence(&mut recognizer, None), Some(pred(1)));
        let p = pred(1);
        assert_eq!(p.eval_precedence(&mut recognizer, None), Some(p.clone()));
    }
}
