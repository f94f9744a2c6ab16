//! Recurrence rules attached to tasks through the `repeat` field.
//!
//! Grammar: `<span>(!)?(: <amount>)?` where `<span>` is one of `daily`,
//! `weekly`, `monthly`, `yearly`, `weekday`, `month` or a month name
//! (`jan` .. `dec`). A `!` computes the next date from today instead of from
//! the current due date.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use time::{Date, Duration, Month, Weekday};

use crate::error::RepeatError;
use crate::parser::pattern;
use crate::task::Task;
use crate::value::{DueOn, REPEAT_FIELD};

static RULE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"^(daily|weekly|monthly|yearly|weekday|month|jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)(!)?(?:\s*:\s*(\d+))?$",
    )
});

/// Unit a repeat rule advances by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatSpan {
    /// `amount` days.
    Daily,
    /// `amount` weeks.
    Weekly,
    /// `amount` months.
    Monthly,
    /// `amount` years.
    Yearly,
    /// Next working day.
    Weekday,
    /// Exactly one month.
    Month,
    /// Once a year, in the named month.
    Named(Month),
}

/// Parsed `repeat` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatRule {
    /// Step unit.
    pub span: RepeatSpan,
    /// Count from today rather than from the due date (`!`).
    pub from_today: bool,
    /// Number of units; `0` when omitted.
    pub amount: u32,
}

impl FromStr for RepeatRule {
    type Err = RepeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let caps = RULE
            .captures(&normalized)
            .ok_or_else(|| RepeatError::Parse(s.to_owned()))?;
        let span = match caps.get(1).map_or("", |m| m.as_str()) {
            "daily" => RepeatSpan::Daily,
            "weekly" => RepeatSpan::Weekly,
            "monthly" => RepeatSpan::Monthly,
            "yearly" => RepeatSpan::Yearly,
            "weekday" => RepeatSpan::Weekday,
            "month" => RepeatSpan::Month,
            name => RepeatSpan::Named(month_from_abbrev(name).ok_or_else(|| RepeatError::Parse(s.to_owned()))?),
        };
        let amount = caps
            .get(3)
            .map(|m| m.as_str().parse::<u32>())
            .transpose()
            .map_err(|_| RepeatError::Parse(s.to_owned()))?
            .unwrap_or(0);
        Ok(Self {
            span,
            from_today: caps.get(2).is_some(),
            amount,
        })
    }
}

fn month_from_abbrev(name: &str) -> Option<Month> {
    Some(match name {
        "jan" => Month::January,
        "feb" => Month::February,
        "mar" => Month::March,
        "apr" => Month::April,
        "may" => Month::May,
        "jun" => Month::June,
        "jul" => Month::July,
        "aug" => Month::August,
        "sep" => Month::September,
        "oct" => Month::October,
        "nov" => Month::November,
        "dec" => Month::December,
        _ => return None,
    })
}

impl RepeatRule {
    /// Date following `from` under this rule.
    #[must_use]
    pub fn advance(self, from: Date) -> Date {
        let amount = i64::from(self.amount);
        match self.span {
            RepeatSpan::Daily => from.saturating_add(Duration::days(amount)),
            RepeatSpan::Weekly => from.saturating_add(Duration::weeks(amount)),
            RepeatSpan::Monthly => add_months(from, amount),
            RepeatSpan::Yearly => add_months(from, amount * 12),
            RepeatSpan::Weekday => {
                let step = match from.weekday() {
                    Weekday::Friday => 3,
                    Weekday::Saturday => 2,
                    _ => 1,
                };
                from.saturating_add(Duration::days(step))
            }
            RepeatSpan::Month => add_months(from, 1),
            RepeatSpan::Named(_) => add_months(from, 12),
        }
    }
}

/// Shift by whole months, clamping the day to the target month's length.
fn add_months(from: Date, months: i64) -> Date {
    let index = i64::from(from.year()) * 12 + i64::from(u8::from(from.month())) - 1 + months;
    let month = u8::try_from(index.rem_euclid(12) + 1)
        .ok()
        .and_then(|m| Month::try_from(m).ok());
    let (Ok(year), Some(month)) = (i32::try_from(index.div_euclid(12)), month) else {
        return from;
    };
    (1..=from.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
        .unwrap_or(from)
}

/// A task repeats when it has both a `repeat` field and a due date.
#[must_use]
pub fn is_task_repeating(task: &Task) -> bool {
    task.dataview_fields.contains(REPEAT_FIELD) && task.due_on.is_some()
}

/// Next due date of a repeating task.
///
/// # Errors
/// [`RepeatError::NotRepeating`] when the task lacks a rule or a due date, and
/// [`RepeatError::Parse`] when the rule text is malformed.
pub fn get_next_repeat_date(task: &Task, today: Date) -> Result<Date, RepeatError> {
    let (Some(due), true) = (task.due_on, is_task_repeating(task)) else {
        return Err(RepeatError::NotRepeating(task.id));
    };
    let text = task
        .dataview_fields
        .get(REPEAT_FIELD)
        .map(ToString::to_string)
        .unwrap_or_default();
    let rule: RepeatRule = text.parse()?;
    let from = if rule.from_today { today } else { due.date() };
    Ok(rule.advance(from))
}

/// Spawn the next instance of a repeating task.
///
/// The returned task is open, due on the next date, and carries the completed
/// instance in [`Task::before`]. That predecessor loses its `repeat` field so
/// it never spawns again.
///
/// # Errors
/// Same as [`get_next_repeat_date`].
pub fn get_next_repeating_task(task: &Task, today: Date) -> Result<Task, RepeatError> {
    let next_due = get_next_repeat_date(task, today)?;
    let done = task.mutate(|t| {
        t.dataview_fields.remove(REPEAT_FIELD);
        t.before = None;
    });
    Ok(task.mutate(|t| {
        t.due_on = Some(DueOn(next_due));
        t.completed = false;
        t.completed_on = None;
        t.before = Some(Arc::new(done));
    }))
}
