//! Reader and writer for the SAS+ task file format, version 3.
//!
//! The reader preserves the element order of mutex groups and operator
//! conditions exactly as found in the file, so writing a parsed task
//! reproduces the input byte for byte (modulo trailing whitespace). Any
//! version other than 3, duplicate operator names, and axiom rules are
//! fatal load errors.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, VindexError};
use crate::task::{Axiom, Effect, Fact, MutexGroup, Operator, Task, Variables};

struct Cursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    origin: String,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, origin: &str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
            origin: origin.to_string(),
        }
    }

    fn err(&self, message: impl Into<String>) -> VindexError {
        VindexError::Parse {
            origin: self.origin.clone(),
            line: self.pos,
            message: message.into(),
        }
    }

    /// Next line with surrounding whitespace removed.
    fn next(&mut self) -> Result<&'a str> {
        self.next_raw().map(str::trim)
    }

    /// Next line as-is; operator names keep their interior spacing.
    fn next_raw(&mut self) -> Result<&'a str> {
        let line = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.err("unexpected end of file"))?;
        self.pos += 1;
        Ok(line)
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        let line = self.next()?;
        if line != tag {
            return Err(self.err(format!("expected '{tag}', found '{line}'")));
        }
        Ok(())
    }

    fn next_usize(&mut self) -> Result<usize> {
        let line = self.next()?;
        line.parse()
            .map_err(|_| self.err(format!("expected an unsigned integer, found '{line}'")))
    }

    fn next_pair(&mut self) -> Result<(usize, usize)> {
        let line = self.next()?;
        let mut parts = line.split_whitespace();
        let first = parts.next().and_then(|p| p.parse().ok());
        let second = parts.next().and_then(|p| p.parse().ok());
        match (first, second, parts.next()) {
            (Some(a), Some(b), None) => Ok((a, b)),
            _ => Err(self.err(format!("expected 'var val', found '{line}'"))),
        }
    }

    fn next_ints(&mut self) -> Result<Vec<i64>> {
        let line = self.next()?;
        line.split_whitespace()
            .map(|p| {
                p.parse()
                    .map_err(|_| self.err(format!("expected integers, found '{line}'")))
            })
            .collect()
    }
}

fn value_from(raw: i64, cursor: &Cursor) -> Result<Option<usize>> {
    match raw {
        -1 => Ok(None),
        v if v >= 0 => Ok(Some(v as usize)),
        v => Err(cursor.err(format!("negative value {v} is not a domain value"))),
    }
}

/// Parses a task from a string. `origin` labels parse errors.
pub fn read_task(text: &str, origin: &str) -> Result<Task> {
    let mut cursor = Cursor::new(text, origin);

    cursor.expect("begin_version")?;
    let version = cursor.next()?;
    if version != "3" {
        return Err(VindexError::UnsupportedVersion {
            found: version.to_string(),
        });
    }
    cursor.expect("end_version")?;

    cursor.expect("begin_metric")?;
    let metric = cursor.next()? != "0";
    cursor.expect("end_metric")?;

    let num_vars = cursor.next_usize()?;
    let mut ranges = Vec::with_capacity(num_vars);
    let mut axiom_layers = Vec::with_capacity(num_vars);
    let mut value_names = Vec::with_capacity(num_vars);
    for _ in 0..num_vars {
        cursor.expect("begin_variable")?;
        let _name = cursor.next()?;
        let layer: i32 = cursor
            .next()?
            .parse()
            .map_err(|_| cursor.err("expected an axiom layer"))?;
        let range = cursor.next_usize()?;
        let mut names = Vec::with_capacity(range);
        for _ in 0..range {
            names.push(cursor.next()?.to_string());
        }
        cursor.expect("end_variable")?;
        ranges.push(range);
        axiom_layers.push(layer);
        value_names.push(names);
    }

    let num_mutexes = cursor.next_usize()?;
    let mut mutexes = Vec::with_capacity(num_mutexes);
    for _ in 0..num_mutexes {
        cursor.expect("begin_mutex_group")?;
        let group_size = cursor.next_usize()?;
        let mut facts = Vec::with_capacity(group_size);
        for _ in 0..group_size {
            let (var, val) = cursor.next_pair()?;
            facts.push(Fact::new(var, val));
        }
        cursor.expect("end_mutex_group")?;
        mutexes.push(MutexGroup { facts });
    }

    cursor.expect("begin_state")?;
    let mut init = Vec::with_capacity(num_vars);
    for _ in 0..num_vars {
        init.push(cursor.next_usize()?);
    }
    cursor.expect("end_state")?;

    cursor.expect("begin_goal")?;
    let num_goals = cursor.next_usize()?;
    let mut goal = Vec::with_capacity(num_goals);
    for _ in 0..num_goals {
        let (var, val) = cursor.next_pair()?;
        goal.push(Fact::new(var, val));
    }
    cursor.expect("end_goal")?;

    let num_operators = cursor.next_usize()?;
    let mut operators = Vec::with_capacity(num_operators);
    for _ in 0..num_operators {
        cursor.expect("begin_operator")?;
        let name = format!("({})", cursor.next_raw()?);
        let num_prevail = cursor.next_usize()?;
        let mut prevail = Vec::with_capacity(num_prevail);
        for _ in 0..num_prevail {
            let (var, val) = cursor.next_pair()?;
            prevail.push(Fact::new(var, val));
        }
        let num_effects = cursor.next_usize()?;
        let mut pre_post = Vec::with_capacity(num_effects);
        for _ in 0..num_effects {
            let ints = cursor.next_ints()?;
            let num_conditions = *ints.first().ok_or_else(|| cursor.err("empty effect line"))? as usize;
            if ints.len() != 1 + 2 * num_conditions + 3 {
                return Err(cursor.err("malformed effect line"));
            }
            let mut conditions = Vec::with_capacity(num_conditions);
            for c in 0..num_conditions {
                let var = ints[1 + 2 * c];
                let val = ints[2 + 2 * c];
                match (value_from(var, &cursor)?, value_from(val, &cursor)?) {
                    (Some(var), Some(val)) => conditions.push(Fact::new(var, val)),
                    _ => return Err(cursor.err("malformed effect condition")),
                }
            }
            let base = 1 + 2 * num_conditions;
            let var = value_from(ints[base], &cursor)?
                .ok_or_else(|| cursor.err("effect variable must be non-negative"))?;
            let pre = value_from(ints[base + 1], &cursor)?;
            let post = value_from(ints[base + 2], &cursor)?
                .ok_or_else(|| cursor.err("effect value must be non-negative"))?;
            pre_post.push(Effect {
                var,
                pre,
                post,
                conditions,
            });
        }
        let cost = cursor.next_usize()? as u64;
        cursor.expect("end_operator")?;
        if operators.iter().any(|op: &Operator| op.name == name) {
            return Err(VindexError::DuplicateOperator { name });
        }
        operators.push(Operator::new(name, prevail, pre_post, cost));
    }

    let num_axioms = cursor.next_usize()?;
    if num_axioms > 0 {
        return Err(VindexError::AxiomsUnsupported);
    }

    let task = Task {
        variables: Variables {
            ranges,
            axiom_layers,
            value_names,
        },
        mutexes,
        init,
        goal,
        operators,
        axioms: Vec::new(),
        metric,
    };
    task.validate()?;
    Ok(task)
}

/// Reads a task file.
pub fn read_task_file(path: &Path) -> Result<Task> {
    let text = fs::read_to_string(path)?;
    read_task(&text, &path.display().to_string())
}

/// Reads a task file, then re-serializes the parsed task and checks that it
/// matches the input (ignoring trailing whitespace and blank lines).
pub fn read_task_file_verified(path: &Path) -> Result<Task> {
    let text = fs::read_to_string(path)?;
    let task = read_task(&text, &path.display().to_string())?;
    let round_trip = task_to_string(&task);
    let mismatch = !lines_equal_ignoring_whitespace(&text, &round_trip);
    if mismatch {
        return Err(VindexError::InvalidTask {
            message: format!("re-serializing {} does not reproduce the input", path.display()),
        });
    }
    Ok(task)
}

fn lines_equal_ignoring_whitespace(left: &str, right: &str) -> bool {
    let filter = |text: &str| -> Vec<String> {
        text.lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    };
    filter(left) == filter(right)
}

/// Serializes a task in the version-3 format.
pub fn write_task<W: Write>(task: &Task, writer: &mut W) -> Result<()> {
    writeln!(writer, "begin_version")?;
    writeln!(writer, "3")?;
    writeln!(writer, "end_version")?;
    writeln!(writer, "begin_metric")?;
    writeln!(writer, "{}", if task.metric { 1 } else { 0 })?;
    writeln!(writer, "end_metric")?;

    writeln!(writer, "{}", task.variables.len())?;
    for var in 0..task.variables.len() {
        writeln!(writer, "begin_variable")?;
        writeln!(writer, "var{var}")?;
        writeln!(writer, "{}", task.variables.axiom_layers[var])?;
        writeln!(writer, "{}", task.variables.ranges[var])?;
        for name in &task.variables.value_names[var] {
            writeln!(writer, "{name}")?;
        }
        writeln!(writer, "end_variable")?;
    }

    writeln!(writer, "{}", task.mutexes.len())?;
    for group in &task.mutexes {
        writeln!(writer, "begin_mutex_group")?;
        writeln!(writer, "{}", group.facts.len())?;
        for fact in &group.facts {
            writeln!(writer, "{} {}", fact.var, fact.val)?;
        }
        writeln!(writer, "end_mutex_group")?;
    }

    writeln!(writer, "begin_state")?;
    for &val in &task.init {
        writeln!(writer, "{val}")?;
    }
    writeln!(writer, "end_state")?;

    writeln!(writer, "begin_goal")?;
    writeln!(writer, "{}", task.goal.len())?;
    for fact in &task.goal {
        writeln!(writer, "{} {}", fact.var, fact.val)?;
    }
    writeln!(writer, "end_goal")?;

    writeln!(writer, "{}", task.operators.len())?;
    for op in &task.operators {
        writeln!(writer, "begin_operator")?;
        let bare = op
            .name
            .strip_prefix('(')
            .and_then(|name| name.strip_suffix(')'))
            .unwrap_or(&op.name);
        writeln!(writer, "{bare}")?;
        writeln!(writer, "{}", op.prevail.len())?;
        for fact in &op.prevail {
            writeln!(writer, "{} {}", fact.var, fact.val)?;
        }
        writeln!(writer, "{}", op.pre_post.len())?;
        for eff in &op.pre_post {
            write!(writer, "{}", eff.conditions.len())?;
            for cond in &eff.conditions {
                write!(writer, " {} {}", cond.var, cond.val)?;
            }
            let pre = eff.pre.map_or(-1, |v| v as i64);
            writeln!(writer, " {} {} {}", eff.var, pre, eff.post)?;
        }
        writeln!(writer, "{}", op.cost)?;
        writeln!(writer, "end_operator")?;
    }

    writeln!(writer, "{}", task.axioms.len())?;
    for axiom in &task.axioms {
        writeln!(writer, "begin_rule")?;
        writeln!(writer, "{}", axiom.conditions.len())?;
        for cond in &axiom.conditions {
            writeln!(writer, "{} {}", cond.var, cond.val)?;
        }
        let pre = axiom.pre.map_or(-1, |v| v as i64);
        writeln!(writer, "{} {} {}", axiom.var, pre, axiom.post)?;
        writeln!(writer, "end_rule")?;
    }
    Ok(())
}

/// Serializes a task to a string.
pub fn task_to_string(task: &Task) -> String {
    let mut buffer = Vec::new();
    // Writing to a Vec cannot fail.
    write_task(task, &mut buffer).expect("in-memory write");
    String::from_utf8(buffer).expect("task serialization is utf-8")
}

/// Writes a task file.
pub fn write_task_file(task: &Task, path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    write_task(task, &mut file)?;
    Ok(())
}
