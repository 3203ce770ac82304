use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use worldgen::Side;

/// One scripted player action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Walk(Side),
    /// Walk `count` random sides, rolled from the world seed at run time.
    Wander { count: u32 },
    Dig,
    Climb,
    Door,
    Wait { turns: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ScriptError {
    #[error("unknown step '{0}'; expected n, s, e, w, dig, climb, door, wait:N or random:N")]
    UnknownStep(String),
    #[error("step '{0}' needs a whole-number count")]
    BadCount(String),
}

/// Parses a comma or whitespace separated walk such as `e,e,s,dig,wait:3`.
pub(crate) fn parse_script(raw: &str) -> Result<Vec<Step>, ScriptError> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_step)
        .collect()
}

fn parse_step(token: &str) -> Result<Step, ScriptError> {
    let lower = token.to_ascii_lowercase();
    let (name, arg) = match lower.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (lower.as_str(), None),
    };
    let count = || -> Result<u32, ScriptError> {
        arg.unwrap_or("1")
            .parse::<u32>()
            .map_err(|_| ScriptError::BadCount(token.to_string()))
    };
    match name {
        "n" | "north" => Ok(Step::Walk(Side::North)),
        "s" | "south" => Ok(Step::Walk(Side::South)),
        "e" | "east" => Ok(Step::Walk(Side::East)),
        "w" | "west" => Ok(Step::Walk(Side::West)),
        "dig" => Ok(Step::Dig),
        "climb" => Ok(Step::Climb),
        "door" => Ok(Step::Door),
        "wait" => Ok(Step::Wait { turns: count()? }),
        "random" => Ok(Step::Wander { count: count()? }),
        _ => Err(ScriptError::UnknownStep(token.to_string())),
    }
}

/// Expands `Wander` steps into concrete walks. Same seed, same path.
pub(crate) fn expand_wander(steps: &[Step], seed: u64) -> Vec<Step> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut expanded = Vec::with_capacity(steps.len());
    for step in steps {
        match step {
            Step::Wander { count } => {
                for _ in 0..*count {
                    let side = Side::ALL[rng.gen_range(0..Side::ALL.len())];
                    expanded.push(Step::Walk(side));
                }
            }
            other => expanded.push(*other),
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_separators_and_counts() {
        let steps = parse_script("e, E  north,dig wait:3 random:2 door climb").expect("parse");
        assert_eq!(
            steps,
            vec![
                Step::Walk(Side::East),
                Step::Walk(Side::East),
                Step::Walk(Side::North),
                Step::Dig,
                Step::Wait { turns: 3 },
                Step::Wander { count: 2 },
                Step::Door,
                Step::Climb,
            ]
        );
        assert!(parse_script("").expect("empty").is_empty());
    }

    #[test]
    fn rejects_unknown_steps_and_bad_counts() {
        assert_eq!(
            parse_script("e,fly"),
            Err(ScriptError::UnknownStep("fly".to_string()))
        );
        assert_eq!(
            parse_script("wait:soon"),
            Err(ScriptError::BadCount("wait:soon".to_string()))
        );
    }

    #[test]
    fn wander_expansion_is_seeded() {
        let steps = [Step::Dig, Step::Wander { count: 5 }];
        let first = expand_wander(&steps, 7);
        assert_eq!(first.len(), 6);
        assert_eq!(first[0], Step::Dig);
        assert!(first[1..].iter().all(|step| matches!(step, Step::Walk(_))));
        assert_eq!(first, expand_wander(&steps, 7));
    }
}
