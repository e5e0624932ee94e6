//! Text front-ends for placement rules and teacher availability, driven by
//! the pest grammar in `rules.pest`.
//!
//! Both parsers are lenient: anything they cannot read is dropped, so a
//! typo in one clause never takes down a run.

use std::ops::Range;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use types::{Availability, DayOfWeek, SlotConstraint};

/// Instructional hours granted per credit.
pub const HOURS_PER_CREDIT: u32 = 25;

#[derive(Parser)]
#[grammar = "rules.pest"]
struct RuleParser;

/// Top-level clauses of `text` parsed as `rule`; empty if the text does not parse.
fn clauses(rule: Rule, text: &str) -> Vec<Pair<'_, Rule>> {
    RuleParser::parse(rule, text)
        .ok()
        .and_then(|mut pairs| pairs.next())
        .map(|root| root.into_inner().collect())
        .unwrap_or_default()
}

fn day_of(pair: &Pair<Rule>) -> Option<DayOfWeek> {
    DayOfWeek::parse_prefix(pair.as_str())
}

/// `P<n>` or `P<n>-<m>` (1-based, inclusive) as 0-based indices.
fn period_bounds(pair: Pair<Rule>) -> Option<Range<u32>> {
    let mut nums = pair.into_inner().map(|n| n.as_str().parse::<u32>().ok());
    let start = nums.next()??;
    let end = match nums.next() {
        Some(n) => n?,
        None => start,
    };
    if start == 0 || end < start {
        return None;
    }
    Some(start - 1..end)
}

fn clipped(range: Option<Range<u32>>, periods: u32) -> Vec<u32> {
    range.map(|r| (r.start..r.end.min(periods)).collect()).unwrap_or_default()
}

fn not_periods(window: Option<Pair<Rule>>, periods: u32) -> Vec<u32> {
    let mid = periods / 2;
    let Some(w) = window else {
        return (0..periods).collect();
    };
    match w.as_rule() {
        Rule::morning => (0..mid).collect(),
        Rule::afternoon => (mid..periods).collect(),
        Rule::first => vec![0],
        Rule::last => vec![periods - 1],
        Rule::period => clipped(period_bounds(w), periods),
        _ => Vec::new(),
    }
}

fn not_clause(clause: Pair<Rule>, periods: u32) -> Vec<SlotConstraint> {
    let mut day = None;
    let mut window = None;
    for p in clause.into_inner() {
        match p.as_rule() {
            Rule::kw_not => {}
            Rule::day => day = day_of(&p),
            _ => window = Some(p),
        }
    }
    not_periods(window, periods)
        .into_iter()
        .filter(|&p| p < periods)
        .map(|p| SlotConstraint::not(day, p))
        .collect()
}

fn assign_slot(slot: Pair<Rule>, periods: u32) -> Option<SlotConstraint> {
    let mut inner = slot.into_inner();
    let day = day_of(&inner.next()?)?;
    let range = period_bounds(inner.next()?)?;
    if range.len() != 1 || range.start >= periods {
        return None;
    }
    Some(SlotConstraint::assign(day, range.start))
}

/// Parses `NOT <day?> <P<n>|P<n>-<m>|MORNING|AFTERNOON|FIRST|LAST>` and
/// `ASSIGN <day> P<n>[, <day> P<n>][; <day> P<n> ...]`. Clauses are joined
/// with `;`. Unreadable clauses are dropped.
pub fn parse_constraint(text: &str, periods_per_day: u32) -> Vec<SlotConstraint> {
    let periods = periods_per_day.max(1);
    let mut out = Vec::new();
    for clause in clauses(Rule::constraint_text, text) {
        match clause.as_rule() {
            Rule::not_clause => out.extend(not_clause(clause, periods)),
            Rule::assign_clause => out.extend(
                clause
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::slot)
                    .filter_map(|s| assign_slot(s, periods)),
            ),
            _ => {}
        }
    }

    let mut seen = Vec::with_capacity(out.len());
    out.retain(|c| {
        if seen.contains(c) {
            false
        } else {
            seen.push(*c);
            true
        }
    });
    out
}

/// Parses availability text such as `"Mon P1-2; Wed afternoon unavailable;
/// Fri morning only"`. Empty text or `"always"` means fully available.
pub fn parse_availability(text: &str, periods_per_day: u32) -> Availability {
    let periods = periods_per_day.max(1);
    let mut avail = Availability::always();
    let trimmed = text.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("always")
        || trimmed.eq_ignore_ascii_case("always available")
    {
        return avail;
    }

    let mid = periods / 2;
    for clause in clauses(Rule::availability_text, trimmed) {
        if clause.as_rule() != Rule::day_rule {
            continue;
        }
        let mut inner = clause.into_inner();
        let Some(day) = inner.next().as_ref().and_then(day_of) else {
            continue;
        };
        let rest: Vec<Pair<Rule>> = inner.collect();
        let shape: Vec<Rule> = rest.iter().map(Pair::as_rule).collect();
        let blocked: Vec<u32> = match shape.as_slice() {
            [Rule::period] => clipped(rest.into_iter().next().and_then(period_bounds), periods),
            [Rule::morning, Rule::kw_only] | [Rule::afternoon, Rule::unavailable] => (mid..periods).collect(),
            [Rule::afternoon, Rule::kw_only] | [Rule::morning, Rule::unavailable] => (0..mid).collect(),
            [Rule::unavailable] => (0..periods).collect(),
            _ => Vec::new(),
        };

        for p in blocked.into_iter().filter(|&p| p < periods) {
            avail.block(day, p);
        }
    }
    avail
}

/// Weekly periods needed to deliver `credits` over `weeks` weeks of
/// `period_minutes`-long periods. Never less than one.
pub fn periods_for_credits(credits: u32, period_minutes: u32, weeks: u32) -> u32 {
    if period_minutes == 0 || weeks == 0 {
        return 1;
    }
    let minutes = credits.saturating_mul(HOURS_PER_CREDIT * 60);
    let per_year = minutes.div_ceil(period_minutes);
    per_year.div_ceil(weeks).max(1)
}
