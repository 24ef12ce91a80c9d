//! Reader and writer for plan files.
//!
//! A plan file is a list of parenthesized action names, one per line,
//! terminated by a cost trailer such as `; cost = 12 (general cost)`.

use std::fs;
use std::io::Write;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, VindexError};
use crate::plan::{CostKind, Plan, PlanStep, SKIP_ACTION_PREFIX};

lazy_static! {
    static ref COST_TRAILER: Regex =
        Regex::new(r"^; cost = (\d+) \((unit|general) cost\)$").unwrap();
}

fn parse_step(line: &str) -> PlanStep {
    if let Some(rest) = line.strip_prefix(SKIP_ACTION_PREFIX) {
        if let Some(position) = rest.strip_suffix(')').and_then(|p| p.parse().ok()) {
            return PlanStep::Skip(position);
        }
    }
    PlanStep::Action(line.to_string())
}

/// Parses a plan from a string. `origin` labels parse errors.
pub fn read_plan(text: &str, origin: &str) -> Result<Plan> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();
    let Some(&(trailer_line, trailer)) = lines.last() else {
        return Err(VindexError::Parse {
            origin: origin.to_string(),
            line: 0,
            message: "plan file is empty".to_string(),
        });
    };
    let captures = COST_TRAILER.captures(trailer).ok_or_else(|| VindexError::Parse {
        origin: origin.to_string(),
        line: trailer_line,
        message: format!("expected a cost trailer, found '{trailer}'"),
    })?;
    let cost = captures[1].parse().map_err(|_| VindexError::Parse {
        origin: origin.to_string(),
        line: trailer_line,
        message: "plan cost does not fit an unsigned integer".to_string(),
    })?;
    let cost_kind = if &captures[2] == "unit" {
        CostKind::Unit
    } else {
        CostKind::General
    };
    let steps = lines[..lines.len() - 1]
        .iter()
        .map(|&(_, line)| parse_step(line))
        .collect();
    Ok(Plan::new(steps, cost, cost_kind))
}

/// Reads a plan file.
pub fn read_plan_file(path: &Path) -> Result<Plan> {
    let text = fs::read_to_string(path)?;
    read_plan(&text, &path.display().to_string())
}

/// Serializes a plan, trailer included.
pub fn write_plan<W: Write>(plan: &Plan, writer: &mut W) -> Result<()> {
    for step in &plan.steps {
        match step {
            PlanStep::Action(name) => writeln!(writer, "{name}")?,
            PlanStep::Skip(position) => writeln!(writer, "{SKIP_ACTION_PREFIX}{position})")?,
        }
    }
    writeln!(writer, "; cost = {} ({})", plan.cost, plan.cost_kind.label())?;
    Ok(())
}

/// Writes a plan file.
pub fn write_plan_file(plan: &Plan, path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    write_plan(plan, &mut file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
(pick-up b1)
(stack b1 b2)
; cost = 2 (unit cost)
";

    #[test]
    fn test_parse_plan() {
        let plan = read_plan(SAMPLE, "sas_plan").unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.cost, 2);
        assert_eq!(plan.cost_kind, CostKind::Unit);
        assert_eq!(plan.steps[0], PlanStep::Action("(pick-up b1)".to_string()));
    }

    #[test]
    fn test_parse_skip_entries() {
        let text = "(pick-up b1)\n(skip-action plan-pos-1)\n; cost = 1 (general cost)\n";
        let plan = read_plan(text, "sas_plan").unwrap();
        assert_eq!(plan.steps[1], PlanStep::Skip(1));
        assert_eq!(plan.skip_positions(), vec![2]);
    }

    #[test]
    fn test_missing_trailer_is_an_error() {
        let text = "(pick-up b1)\n";
        assert!(matches!(
            read_plan(text, "sas_plan"),
            Err(VindexError::Parse { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let plan = read_plan(SAMPLE, "sas_plan").unwrap();
        let mut buffer = Vec::new();
        write_plan(&plan, &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), SAMPLE);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sas_plan");
        let plan = read_plan(SAMPLE, "sas_plan").unwrap();
        write_plan_file(&plan, &path).unwrap();
        assert_eq!(read_plan_file(&path).unwrap(), plan);
    }
}
