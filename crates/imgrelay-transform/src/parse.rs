//! Grammar for transform chains.
//!
//! ```text
//! chain  := op (',' op)*
//! op     := code '-' params
//! params := int ('x' int)*
//! ```
//!
//! Parsing stops at the first malformed token and returns no operations at all.
//! The normalized chain doubles as a cache file-name component, so its length is
//! capped at [`MAX_CHAIN_LENGTH`].

use crate::error::{TransformError, TransformResult};
use crate::model::{Operation, OperationCode, TransformChain};

const OPERATION_SEPARATOR: char = ',';
const CODE_SEPARATOR: char = '-';
const PARAM_SEPARATOR: char = 'x';

/// Longest normalized chain accepted, in bytes.
pub const MAX_CHAIN_LENGTH: usize = 128;

/// Parse a chain string into a validated [`TransformChain`].
///
/// # Errors
///
/// Returns [`TransformError::InvalidOperation`] for the first token that is empty,
/// uses an unknown code, carries a non-integer parameter, or has the wrong arity,
/// and for a whole chain whose normalized form exceeds [`MAX_CHAIN_LENGTH`].
pub fn parse(chain: &str) -> TransformResult<TransformChain> {
    let operations = chain
        .split(OPERATION_SEPARATOR)
        .map(str::trim)
        .map(parse_operation)
        .collect::<TransformResult<Vec<_>>>()?;
    let parsed = TransformChain::new(operations)
        .ok_or_else(|| TransformError::invalid(chain, "empty_chain"))?;
    if parsed.signature().len() > MAX_CHAIN_LENGTH {
        return Err(TransformError::invalid(chain.trim(), "chain_too_long"));
    }
    Ok(parsed)
}

fn parse_operation(token: &str) -> TransformResult<Operation> {
    if token.is_empty() {
        return Err(TransformError::invalid(token, "empty_operation"));
    }
    let (code, params) = token
        .split_once(CODE_SEPARATOR)
        .ok_or_else(|| TransformError::invalid(token, "missing_parameters"))?;
    let code = OperationCode::from_token(code)
        .ok_or_else(|| TransformError::invalid(token, "unknown_code"))?;
    let params = params
        .split(PARAM_SEPARATOR)
        .map(|param| {
            param
                .parse::<i64>()
                .map_err(|_| TransformError::invalid(token, "non_integer_parameter"))
        })
        .collect::<TransformResult<Vec<_>>>()?;
    if !code.arity().contains(&params.len()) {
        return Err(TransformError::invalid(token, "wrong_arity"));
    }
    build(code, &params).map_err(|reason| TransformError::invalid(token, reason))
}

fn build(code: OperationCode, params: &[i64]) -> Result<Operation, &'static str> {
    let operation = match (code, params) {
        (OperationCode::Resize, [width]) => Operation::Resize {
            width: dimension(*width)?,
            height: None,
        },
        (OperationCode::Resize, [width, height]) => Operation::Resize {
            width: dimension(*width)?,
            height: Some(dimension(*height)?),
        },
        (OperationCode::Rotate, [degrees]) => Operation::Rotate {
            degrees: i32::try_from(*degrees).map_err(|_| "out_of_range")?,
        },
        (OperationCode::Extract, [left, top, width, height]) => Operation::Extract {
            left: dimension(*left)?,
            top: dimension(*top)?,
            width: dimension(*width)?,
            height: dimension(*height)?,
        },
        (OperationCode::Flop, [flag]) => Operation::Flop {
            enabled: flag_value(*flag)?,
        },
        (OperationCode::Flip, [flag]) => Operation::Flip {
            enabled: flag_value(*flag)?,
        },
        _ => return Err("wrong_arity"),
    };
    Ok(operation)
}

fn dimension(value: i64) -> Result<u32, &'static str> {
    if value < 0 {
        return Err("negative_parameter");
    }
    u32::try_from(value).map_err(|_| "out_of_range")
}

fn flag_value(value: i64) -> Result<bool, &'static str> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err("flag_not_boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reason_for(chain: &str) -> &'static str {
        match parse(chain) {
            Ok(parsed) => panic!("expected {chain:?} to be rejected, got {parsed}"),
            Err(err) => err.reason(),
        }
    }

    #[test]
    fn parses_every_code_in_order() -> TransformResult<()> {
        let chain = parse("re-200x100,ro-90,ex-10x10x50x50,fx-1,fy-0")?;
        assert_eq!(
            chain.operations(),
            &[
                Operation::Resize {
                    width: 200,
                    height: Some(100),
                },
                Operation::Rotate { degrees: 90 },
                Operation::Extract {
                    left: 10,
                    top: 10,
                    width: 50,
                    height: 50,
                },
                Operation::Flop { enabled: true },
                Operation::Flip { enabled: false },
            ]
        );
        Ok(())
    }

    #[test]
    fn resize_with_single_parameter_sets_width_only() -> TransformResult<()> {
        let chain = parse("re-200")?;
        assert_eq!(
            chain.operations(),
            &[Operation::Resize {
                width: 200,
                height: None,
            }]
        );
        Ok(())
    }

    #[test]
    fn resize_with_three_parameters_is_rejected() {
        assert_eq!(reason_for("re-1x2x3"), "wrong_arity");
    }

    #[test]
    fn extract_with_three_parameters_is_rejected() {
        let Err(err) = parse("ex-10x10x50") else {
            panic!("extract with three parameters should fail");
        };
        assert_eq!(err.token(), "ex-10x10x50");
        assert_eq!(err.reason(), "wrong_arity");
    }

    #[test]
    fn first_bad_token_aborts_the_whole_chain() {
        let Err(err) = parse("re-200,zz-1,ro-90") else {
            panic!("unknown code should fail the chain");
        };
        assert_eq!(err.token(), "zz-1");
        assert_eq!(err.reason(), "unknown_code");
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(reason_for(""), "empty_operation");
        assert_eq!(reason_for("re-1,,ro-90"), "empty_operation");
        assert_eq!(reason_for("re200"), "missing_parameters");
        assert_eq!(reason_for("re-"), "non_integer_parameter");
        assert_eq!(reason_for("re-abc"), "non_integer_parameter");
        assert_eq!(reason_for("re-1.5"), "non_integer_parameter");
        assert_eq!(reason_for("re--5"), "negative_parameter");
        assert_eq!(reason_for("re-99999999999"), "out_of_range");
        assert_eq!(reason_for("fx-2"), "flag_not_boolean");
        assert_eq!(reason_for("ro-90x90"), "wrong_arity");
    }

    #[test]
    fn accepts_negative_rotation_and_whitespace() -> TransformResult<()> {
        let chain = parse(" ro--90 , fy-1 ")?;
        assert_eq!(chain.to_string(), "ro--90,fy-1");
        Ok(())
    }

    #[test]
    fn chain_length_is_capped() -> TransformResult<()> {
        let at_limit = format!("{}re-10x10", "fx-1,".repeat(24));
        assert_eq!(at_limit.len(), MAX_CHAIN_LENGTH);
        assert_eq!(parse(&at_limit)?.signature(), at_limit);

        let past_limit = format!("{}re-10x100", "fx-1,".repeat(24));
        assert_eq!(reason_for(&past_limit), "chain_too_long");
        assert_eq!(reason_for(&["fx-1"; 50].join(",")), "chain_too_long");
        Ok(())
    }

    #[test]
    fn padding_does_not_count_towards_the_cap() -> TransformResult<()> {
        let padded = format!("  {}  ", ["fx-1"; 25].join(" , "));
        assert_eq!(parse(&padded)?.signature().len(), 124);
        Ok(())
    }

    fn operation_strategy() -> impl Strategy<Value = Operation> {
        prop_oneof![
            (0..5000_u32, proptest::option::of(0..5000_u32))
                .prop_map(|(width, height)| Operation::Resize { width, height }),
            (-720..720_i32).prop_map(|degrees| Operation::Rotate { degrees }),
            (0..500_u32, 0..500_u32, 0..500_u32, 0..500_u32).prop_map(
                |(left, top, width, height)| Operation::Extract {
                    left,
                    top,
                    width,
                    height,
                }
            ),
            any::<bool>().prop_map(|enabled| Operation::Flop { enabled }),
            any::<bool>().prop_map(|enabled| Operation::Flip { enabled }),
        ]
    }

    proptest! {
        #[test]
        fn normalized_chains_round_trip(
            operations in proptest::collection::vec(operation_strategy(), 1..6),
        ) {
            let Some(chain) = TransformChain::new(operations) else {
                return Err(TestCaseError::fail("generated chain was empty"));
            };
            let rendered = chain.to_string();
            let reparsed = parse(&rendered).map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(&reparsed, &chain);
            prop_assert_eq!(reparsed.to_string(), rendered);
        }

        #[test]
        fn a_malformed_token_anywhere_rejects_the_chain(
            operations in proptest::collection::vec(operation_strategy(), 0..6),
            position in 0..6_usize,
            bad in prop_oneof![
                Just("zz-1"),
                Just("re-1x2x3"),
                Just("ex-1x2x3"),
                Just("ro-a"),
                Just("fx"),
            ],
        ) {
            let mut tokens: Vec<String> = operations.iter().map(ToString::to_string).collect();
            let position = position.min(tokens.len());
            tokens.insert(position, bad.to_string());
            let result = parse(&tokens.join(","));
            prop_assert!(result.is_err());
            if let Err(err) = result {
                prop_assert_eq!(err.token(), bad);
            }
        }
    }
}
