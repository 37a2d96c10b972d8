//! The external interface adapter (§6): the callbacks the enclosing solver
//! invokes, and the constraint's textual form.
//!
//! The solver's own bound-change/LP/branching machinery, command-line
//! parsing, and file I/O are explicitly out of scope (§1); this module only
//! models the boundary the core crosses: bound queries, asserting new
//! bounds with an `inferinfo` tag, and the conflict-analysis sink.

use symretope_core::BaseBounds;

use crate::errors::ParseError;
use crate::resolver::Antecedent;

/// What the core needs from the host to read/write variable bounds and hand
/// off conflict antecedents. Mirrors §1's "external collaborators" list:
/// `lb`/`ub` at the current node, asserting bounds with `inferinfo`, and the
/// conflict sink.
pub trait SolverHost: BaseBounds {
    /// Asserts `index := value`, tagged with `inferinfo` (a permutation
    /// power `>= 0`, or [`symretope_core::PEEK_INFERINFO`] for a peek
    /// commit) so a later `resolve_propagation` call can replay it.
    fn assert_bound(&mut self, index: usize, value: bool, inferinfo: i64);

    /// Reports a proven local infeasibility (cutoff), optionally with a
    /// conflict set already known (e.g. from the direct surface-rule path).
    fn report_cutoff(&mut self, antecedents: &[Antecedent]);
}

/// Variable-lock direction (§5 "Locking discipline").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDirection {
    DownOnly,
    UpOnly,
    Both,
}

/// §5: "the constraint declares a variable lock of both directions on every
/// non-singleton cycle variable except the unique minimum (down-only) and
/// maximum (up-only)".
pub fn variable_locks(perm: &symretope_core::Permutation) -> Vec<(usize, LockDirection)> {
    let mut locks = Vec::new();
    for cycle in perm.cycles() {
        if cycle.len() < 2 {
            continue;
        }
        let min = *cycle.iter().min().unwrap();
        let max = *cycle.iter().max().unwrap();
        for &v in cycle {
            let direction = if v == min {
                LockDirection::DownOnly
            } else if v == max {
                LockDirection::UpOnly
            } else {
                LockDirection::Both
            };
            locks.push((v, direction));
        }
    }
    locks
}

/// Prints the constraint's textual form: `symretope([v0,v1,...],[p0,p1,...])`.
pub fn print_textual_form(variable_names: &[String], perm_map: &[usize]) -> String {
    let vars = variable_names.join(",");
    let perm = perm_map.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
    format!("symretope([{vars}],[{perm}])")
}

/// Parses `symretope([v0,v1,...],[p0,p1,...])` back into variable names and
/// the raw (possibly not-yet-compacted) permutation map.
pub fn parse_textual_form(text: &str) -> Result<(Vec<String>, Vec<usize>), ParseError> {
    let inner = text
        .strip_prefix("symretope(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| ParseError::MalformedForm(text.to_string()))?;

    let (vars_part, perm_part) = split_two_bracketed_lists(inner)
        .ok_or_else(|| ParseError::MalformedForm(text.to_string()))?;

    let variable_names: Vec<String> =
        vars_part.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
    let perm_map: Vec<usize> = perm_part
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().parse::<usize>().map_err(|_| ParseError::NotAnInteger(s.to_string())))
        .collect::<Result<_, _>>()?;

    if variable_names.len() != perm_map.len() {
        return Err(ParseError::LengthMismatch {
            vars: variable_names.len(),
            perm: perm_map.len(),
        });
    }
    Ok((variable_names, perm_map))
}

fn split_two_bracketed_lists(inner: &str) -> Option<(&str, &str)> {
    let first_open = inner.find('[')?;
    let first_close = inner[first_open..].find(']')? + first_open;
    let rest = &inner[first_close + 1..];
    let second_open = rest.find('[')? + first_close + 1;
    let second_close = inner[second_open..].find(']')? + second_open;
    Some((&inner[first_open + 1..first_close], &inner[second_open + 1..second_close]))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(vec![1, 2, 3, 0], 0, LockDirection::DownOnly)]
    #[case(vec![1, 2, 3, 0], 3, LockDirection::UpOnly)]
    #[case(vec![1, 2, 3, 0], 1, LockDirection::Both)]
    #[case(vec![1, 0, 3, 2], 0, LockDirection::DownOnly)]
    #[case(vec![1, 0, 3, 2], 1, LockDirection::UpOnly)]
    fn variable_lock_matches_cycle_position(
        #[case] map: Vec<usize>,
        #[case] variable: usize,
        #[case] expected: LockDirection,
    ) {
        let perm = symretope_core::Permutation::build(&map).unwrap();
        let locks = variable_locks(&perm);
        let direction = locks.iter().find(|(v, _)| *v == variable).unwrap().1;
        assert_eq!(direction, expected);
    }

    #[test]
    fn print_then_parse_roundtrips() {
        let names = vec!["x0".to_string(), "x1".to_string(), "x2".to_string()];
        let perm = vec![1, 2, 0];
        let printed = print_textual_form(&names, &perm);
        assert_eq!(printed, "symretope([x0,x1,x2],[1,2,0])");
        let (parsed_names, parsed_perm) = parse_textual_form(&printed).unwrap();
        assert_eq!(parsed_names, names);
        assert_eq!(parsed_perm, perm);
    }

    #[test]
    fn malformed_form_rejected() {
        assert!(parse_textual_form("not_a_symretope([1],[1])").is_err());
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(parse_textual_form("symretope([x0,x1],[0])").is_err());
    }

    #[test]
    fn locks_exempt_cycle_min_and_max() {
        let perm = symretope_core::Permutation::build(&[1, 2, 3, 0]).unwrap();
        let locks = variable_locks(&perm);
        assert_eq!(locks.iter().find(|(v, _)| *v == 0).unwrap().1, LockDirection::DownOnly);
        assert_eq!(locks.iter().find(|(v, _)| *v == 3).unwrap().1, LockDirection::UpOnly);
        assert_eq!(locks.iter().find(|(v, _)| *v == 1).unwrap().1, LockDirection::Both);
    }
}
