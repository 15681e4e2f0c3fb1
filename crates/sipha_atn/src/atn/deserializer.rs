//! Reader for the serialized ATN format (version 3).
//!
//! The serialized form is a sequence of 16-bit units. Every unit after the version
//! is stored with 2 added (mod 2^16) and is shifted back on read, so 0xFFFF read
//! back stands for "none" / -1.

use super::builder::AtnBuilder;
use super::lexer_action::LexerAction;
use super::state::{StateId, StateKind};
use super::transition::{Transition, TransitionKind};
use super::{Atn, GrammarType};
use crate::error::AtnError;
use crate::misc::IntervalSet;
use crate::token::EOF;

/// The only serialized format version this reader accepts.
pub const SERIALIZED_VERSION: u16 = 3;

/// Feature set with lexer actions; the earliest accepted.
pub const BASE_SERIALIZED_UUID: u128 = 0xAADB8D7E_AEEF_4415_AD2B_8204D6CF042E;

/// Adds a second block of sets whose bounds are 32-bit code points.
pub const ADDED_UNICODE_SMP: u128 = 0x59627784_3BE5_417A_B9EB_8131A7286974;

const SUPPORTED_UUIDS: [u128; 2] = [BASE_SERIALIZED_UUID, ADDED_UNICODE_SMP];

const NONE: u16 = 0xFFFF;

/// Options controlling ATN construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AtnDeserializationOptions {
    /// Check structural invariants after loading.
    pub verify_atn: bool,
    /// Add a synthetic alternative to every parser rule matching a per-rule
    /// token type `max_token_type + rule + 1`.
    pub generate_rule_bypass_transitions: bool,
}

impl Default for AtnDeserializationOptions {
    fn default() -> Self {
        Self {
            verify_atn: true,
            generate_rule_bypass_transitions: false,
        }
    }
}

struct Reader<'a> {
    data: &'a [u16],
    pos: usize,
}

impl Reader<'_> {
    fn raw(&mut self) -> Result<u16, AtnError> {
        let value = *self
            .data
            .get(self.pos)
            .ok_or(AtnError::UnexpectedEnd { offset: self.pos })?;
        self.pos += 1;
        Ok(value)
    }

    fn read(&mut self) -> Result<u16, AtnError> {
        Ok(self.raw()?.wrapping_sub(2))
    }

    fn read_usize(&mut self) -> Result<usize, AtnError> {
        Ok(usize::from(self.read()?))
    }

    fn read_i32(&mut self) -> Result<i32, AtnError> {
        let low = u32::from(self.read()?);
        let high = u32::from(self.read()?);
        Ok((low | (high << 16)) as i32)
    }

    fn read_uuid(&mut self) -> Result<u128, AtnError> {
        let mut uuid = 0u128;
        for i in 0..8 {
            uuid |= u128::from(self.read()?) << (16 * i);
        }
        Ok(uuid)
    }

    fn read_state(&mut self, count: usize) -> Result<StateId, AtnError> {
        let index = self.read_usize()?;
        if index >= count {
            return Err(AtnError::state_out_of_range(index, count));
        }
        Ok(StateId(index as u32))
    }
}

fn format_uuid(uuid: u128) -> String {
    format!(
        "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
        (uuid >> 96) as u32,
        (uuid >> 80) as u16,
        (uuid >> 64) as u16,
        (uuid >> 48) as u16,
        uuid & 0xFFFF_FFFF_FFFF
    )
}

/// Deserializes `data` with the given options.
///
/// ```rust
/// use sipha_atn::atn::{deserialize, AtnDeserializationOptions};
/// use sipha_atn::error::AtnError;
///
/// let err = deserialize(&[4], &AtnDeserializationOptions::default()).unwrap_err();
/// assert!(matches!(err, AtnError::UnsupportedVersion { found: 4, .. }));
/// ```
pub fn deserialize(data: &[u16], options: &AtnDeserializationOptions) -> Result<Atn, AtnError> {
    let mut reader = Reader { data, pos: 0 };
    let version = reader.raw()?;
    if version != SERIALIZED_VERSION {
        return Err(AtnError::UnsupportedVersion {
            found: version,
            expected: SERIALIZED_VERSION,
        });
    }
    let uuid = reader.read_uuid()?;
    let Some(feature_level) = SUPPORTED_UUIDS.iter().position(|&u| u == uuid) else {
        return Err(AtnError::UnsupportedUuid {
            uuid: format_uuid(uuid),
        });
    };
    let supports_smp = feature_level >= 1;

    let grammar_offset = reader.pos;
    let grammar_type = match reader.read()? {
        0 => GrammarType::Lexer,
        1 => GrammarType::Parser,
        other => {
            return Err(AtnError::InvariantViolated {
                state: grammar_offset,
                reason: match other {
                    NONE => "missing grammar type",
                    _ => "unknown grammar type",
                },
            })
        }
    };
    let max_token_type = i32::from(reader.read()?);
    let mut builder = AtnBuilder::new(grammar_type, max_token_type);

    read_states(&mut reader, &mut builder)?;
    let state_count = builder.state_count();
    read_rules(&mut reader, &mut builder, grammar_type, state_count)?;

    let nmodes = reader.read_usize()?;
    for _ in 0..nmodes {
        let start = reader.read_state(state_count)?;
        builder.add_mode(start)?;
    }

    let mut sets = Vec::new();
    read_sets(&mut reader, &mut sets, false)?;
    if supports_smp {
        read_sets(&mut reader, &mut sets, true)?;
    }

    read_edges(&mut reader, &mut builder, &sets, state_count)?;

    let ndecisions = reader.read_usize()?;
    for _ in 0..ndecisions {
        let state = reader.read_state(state_count)?;
        builder.define_decision(state)?;
    }

    if grammar_type == GrammarType::Lexer {
        let nactions = reader.read_usize()?;
        for _ in 0..nactions {
            let offset = reader.pos;
            let action_type = reader.read()?;
            let data1 = reader.read()?;
            let data2 = reader.read()?;
            builder.add_lexer_action(lexer_action(action_type, data1, data2, offset)?);
        }
    }

    let atn = builder.build_with(options)?;
    tracing::debug!(
        ?grammar_type,
        states = atn.states().len(),
        smp = supports_smp,
        "deserialized ATN"
    );
    Ok(atn)
}

fn read_states(reader: &mut Reader<'_>, builder: &mut AtnBuilder) -> Result<(), AtnError> {
    let nstates = reader.read_usize()?;
    let mut loop_back_links = Vec::new();
    let mut end_links = Vec::new();
    for _ in 0..nstates {
        let offset = reader.pos;
        let code = reader.read()?;
        let kind = StateKind::from_serialized(code)
            .ok_or(AtnError::InvalidStateType { value: code, offset })?;
        if matches!(kind, StateKind::Invalid) {
            builder.add_state(kind, None);
            continue;
        }
        let rule_index = match reader.read()? {
            NONE => None,
            r => Some(usize::from(r)),
        };
        let is_loop_end = matches!(kind, StateKind::LoopEnd { .. });
        let is_block_start = kind.is_block_start();
        let id = builder.add_state(kind, rule_index);
        if is_loop_end {
            loop_back_links.push((id, reader.read_usize()?));
        } else if is_block_start {
            end_links.push((id, reader.read_usize()?));
        }
    }
    let count = builder.state_count();
    for (id, target) in loop_back_links {
        if target >= count {
            return Err(AtnError::state_out_of_range(target, count));
        }
        if let StateKind::LoopEnd { loop_back_state } = builder.kind_mut(id)? {
            *loop_back_state = Some(StateId(target as u32));
        }
    }
    for (id, target) in end_links {
        if target >= count {
            return Err(AtnError::state_out_of_range(target, count));
        }
        match builder.kind_mut(id)? {
            StateKind::BlockStart { end_state }
            | StateKind::PlusBlockStart { end_state, .. }
            | StateKind::StarBlockStart { end_state } => *end_state = Some(StateId(target as u32)),
            _ => {}
        }
    }

    let non_greedy = reader.read_usize()?;
    for _ in 0..non_greedy {
        let state = reader.read_state(count)?;
        builder.set_non_greedy(state)?;
    }
    let precedence = reader.read_usize()?;
    for _ in 0..precedence {
        let state = reader.read_state(count)?;
        builder.set_left_recursive(state)?;
    }
    Ok(())
}

fn read_rules(
    reader: &mut Reader<'_>,
    builder: &mut AtnBuilder,
    grammar_type: GrammarType,
    state_count: usize,
) -> Result<(), AtnError> {
    let nrules = reader.read_usize()?;
    for _ in 0..nrules {
        let start = reader.read_state(state_count)?;
        let token_type = match grammar_type {
            GrammarType::Lexer => Some(match reader.read()? {
                NONE => EOF,
                t => i32::from(t),
            }),
            GrammarType::Parser => None,
        };
        builder.add_rule(start, token_type)?;
    }
    Ok(())
}

fn read_sets(reader: &mut Reader<'_>, sets: &mut Vec<IntervalSet>, wide: bool) -> Result<(), AtnError> {
    let nsets = reader.read_usize()?;
    for _ in 0..nsets {
        let nintervals = reader.read_usize()?;
        let mut set = IntervalSet::new();
        if reader.read()? != 0 {
            set.add(EOF);
        }
        for _ in 0..nintervals {
            let (a, b) = if wide {
                (reader.read_i32()?, reader.read_i32()?)
            } else {
                (i32::from(reader.read()?), i32::from(reader.read()?))
            };
            set.add_range(a, b);
        }
        sets.push(set);
    }
    Ok(())
}

fn read_edges(
    reader: &mut Reader<'_>,
    builder: &mut AtnBuilder,
    sets: &[IntervalSet],
    state_count: usize,
) -> Result<(), AtnError> {
    let nedges = reader.read_usize()?;
    for _ in 0..nedges {
        let src = reader.read_state(state_count)?;
        let trg = reader.read_state(state_count)?;
        let offset = reader.pos;
        let ttype = reader.read()?;
        let arg1 = reader.read()?;
        let arg2 = reader.read()?;
        let arg3 = reader.read()?;
        let set = |index: u16| {
            sets.get(usize::from(index))
                .cloned()
                .ok_or_else(|| AtnError::invariant(src, "transition refers to an undefined set"))
        };
        let transition = match ttype {
            TransitionKind::EPSILON => Transition::epsilon(trg),
            TransitionKind::RANGE => Transition::new(
                trg,
                TransitionKind::Range {
                    start: if arg3 != 0 { EOF } else { i32::from(arg1) },
                    stop: i32::from(arg2),
                },
            ),
            TransitionKind::RULE => {
                let rule_start = StateId(u32::from(arg1));
                if rule_start.index() >= state_count {
                    return Err(AtnError::state_out_of_range(rule_start.index(), state_count));
                }
                Transition::new(
                    rule_start,
                    TransitionKind::Rule {
                        rule_index: usize::from(arg2),
                        precedence: i32::from(arg3),
                        follow_state: trg,
                    },
                )
            }
            TransitionKind::PREDICATE => Transition::new(
                trg,
                TransitionKind::Predicate {
                    rule_index: usize::from(arg1),
                    pred_index: usize::from(arg2),
                    is_ctx_dependent: arg3 != 0,
                },
            ),
            TransitionKind::ATOM => Transition::atom(trg, if arg3 != 0 { EOF } else { i32::from(arg1) }),
            TransitionKind::ACTION => Transition::new(
                trg,
                TransitionKind::Action {
                    rule_index: usize::from(arg1),
                    action_index: (arg2 != NONE).then_some(usize::from(arg2)),
                    is_ctx_dependent: arg3 != 0,
                },
            ),
            TransitionKind::SET => Transition::new(trg, TransitionKind::Set { set: set(arg1)? }),
            TransitionKind::NOT_SET => Transition::new(trg, TransitionKind::NotSet { set: set(arg1)? }),
            TransitionKind::WILDCARD => Transition::new(trg, TransitionKind::Wildcard),
            TransitionKind::PRECEDENCE => Transition::new(
                trg,
                TransitionKind::Precedence {
                    precedence: i32::from(arg1),
                },
            ),
            value => return Err(AtnError::InvalidTransitionType { value, offset }),
        };
        builder.add_transition(src, transition)?;
    }
    Ok(())
}

fn lexer_action(action_type: u16, data1: u16, data2: u16, offset: usize) -> Result<LexerAction, AtnError> {
    let signed = |v: u16| if v == NONE { -1 } else { i32::from(v) };
    Ok(match action_type {
        LexerAction::CHANNEL => LexerAction::Channel(signed(data1)),
        LexerAction::CUSTOM => LexerAction::Custom {
            rule_index: usize::from(data1),
            action_index: usize::from(data2),
        },
        LexerAction::MODE => LexerAction::Mode(usize::from(data1)),
        LexerAction::MORE => LexerAction::More,
        LexerAction::POP_MODE => LexerAction::PopMode,
        LexerAction::PUSH_MODE => LexerAction::PushMode(usize::from(data1)),
        LexerAction::SKIP => LexerAction::Skip,
        LexerAction::TYPE => LexerAction::Type(signed(data1)),
        value => return Err(AtnError::InvalidLexerActionType { value, offset }),
    })
}

/// Deserializes the string form embedded in generated recognizers.
pub fn deserialize_str(serialized: &str, options: &AtnDeserializationOptions) -> Result<Atn, AtnError> {
    let data: Vec<u16> = serialized.encode_utf16().collect();
    deserialize(&data, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes logical values the way the serializer does: version verbatim, the rest shifted.
    fn encode(uuid: u128, values: &[i32]) -> Vec<u16> {
        let mut out = vec![SERIALIZED_VERSION];
        for i in 0..8 {
            out.push(((uuid >> (16 * i)) as u16).wrapping_add(2));
        }
        out.extend(values.iter().map(|&v| (v as u16).wrapping_add(2)));
        out
    }

    /// s : 1 EOF ;
    fn simple_parser() -> Vec<i32> {
        vec![
            1, 1, // parser, max token type
            5, // states
            2, 0, 7, 0, 1, 0, 1, 0, 1, 0, //
            0, 0, // non-greedy, precedence
            1, 0, // rules
            0, // modes
            0, // sets
            4, // edges
            0, 2, 1, 0, 0, 0, //
            2, 3, 5, 1, 0, 0, //
            3, 4, 5, 0, 0, 1, //
            4, 1, 1, 0, 0, 0, //
            0, // decisions
        ]
    }

    #[test]
    fn test_deserialize_simple_parser() {
        let data = encode(BASE_SERIALIZED_UUID, &simple_parser());
        let atn = deserialize(&data, &AtnDeserializationOptions::default()).unwrap();
        assert_eq!(atn.grammar_type(), GrammarType::Parser);
        assert_eq!(atn.states().len(), 5);
        assert_eq!(atn.rule_stop(0), Some(StateId(1)));
        assert_eq!(atn.next_tokens(StateId(2)).to_string(), "1");
        assert_eq!(atn.next_tokens(StateId(3)).to_string(), "<EOF>");
    }

    #[test]
    fn test_rejects_unknown_uuid() {
        let data = encode(0x1234, &simple_parser());
        let err = deserialize(&data, &AtnDeserializationOptions::default()).unwrap_err();
        match err {
            AtnError::UnsupportedUuid { uuid } => {
                assert_eq!(uuid, "00000000-0000-0000-0000-000000001234");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_uuid_formatting() {
        assert_eq!(
            format_uuid(BASE_SERIALIZED_UUID),
            "AADB8D7E-AEEF-4415-AD2B-8204D6CF042E"
        );
    }

    #[test]
    fn test_truncated_input() {
        let mut data = encode(BASE_SERIALIZED_UUID, &simple_parser());
        data.truncate(20);
        let err = deserialize(&data, &AtnDeserializationOptions::default()).unwrap_err();
        assert_eq!(err, AtnError::UnexpectedEnd { offset: 20 });
    }

    #[test]
    fn test_invalid_transition_type() {
        let mut values = simple_parser();
        // third field of the first edge
        let edge_start = values.len() - 1 - 4 * 6;
        values[edge_start + 2] = 42;
        let data = encode(BASE_SERIALIZED_UUID, &values);
        let err = deserialize(&data, &AtnDeserializationOptions::default()).unwrap_err();
        assert!(matches!(err, AtnError::InvalidTransitionType { value: 42, .. }));
    }

    #[test]
    fn test_smp_sets_use_wide_bounds() {
        // lexer: T : [\u{1F600}-\u{1F64F}] ;
        let values = vec![
            0, 0xFFFE, // lexer, max token type (unused)
            5, // states
            6, 0xFFFF, // tokens start
            2, 0, 7, 0, 1, 0, 1, 0, //
            0, 0, // non-greedy, precedence
            1, 1, 1, // rule 0 starts at 1, token type 1
            1, 0, // one mode starting at 0
            0, // BMP sets
            1, 1, 0, 0xF600, 0x1, 0xF64F, 0x1, // SMP set
            4, // edges
            0, 1, 1, 0, 0, 0, //
            1, 3, 1, 0, 0, 0, //
            3, 4, 7, 0, 0, 0, //
            4, 2, 1, 0, 0, 0, //
            1, 0, // decisions
            0, // lexer actions
        ];
        let data = encode(ADDED_UNICODE_SMP, &values);
        let atn = deserialize(&data, &AtnDeserializationOptions::default()).unwrap();
        let t = &atn.state(StateId(3)).transitions()[0];
        assert!(t.matches(0x1F610, 0, 0x10FFFF));
        assert!(!t.matches('a' as i32, 0, 0x10FFFF));
        assert_eq!(atn.rule_token_type(0), Some(1));
        assert_eq!(atn.mode_start(0), Some(StateId(0)));
    }

    #[test]
    fn test_bypass_transitions() {
        let data = encode(BASE_SERIALIZED_UUID, &simple_parser());
        let options = AtnDeserializationOptions {
            verify_atn: true,
            generate_rule_bypass_transitions: true,
        };
        let atn = deserialize(&data, &options).unwrap();
        assert_eq!(atn.number_of_decisions(), 1);
        let start = atn.state(atn.rule_start(0).unwrap());
        assert_eq!(start.transitions().len(), 1);
        let bypass = atn.decision_state(0).unwrap();
        let next = atn.next_tokens(bypass);
        assert!(next.contains(1));
        assert!(next.contains(2), "bypass token type is max_token_type + 1");
    }
}
