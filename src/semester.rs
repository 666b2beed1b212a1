use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Academic term within a calendar year.
///
/// The source institution opens the calendar year with its winter session,
/// so the annual order is fixed as Winter < Spring < Summer < Fall.
/// `FA25` therefore sorts before `WI26`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Term {
    fn from_code(code: &str) -> Option<Term> {
        match code {
            "WI" => Some(Term::Winter),
            "SP" => Some(Term::Spring),
            "SU" => Some(Term::Summer),
            "FA" => Some(Term::Fall),
            _ => None,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Term::Winter => "WI",
            Term::Spring => "SP",
            Term::Summer => "SU",
            Term::Fall => "FA",
        }
    }
}

/// A semester code such as `SP26`: two-letter term plus two-digit year.
///
/// Ordered by `(year, term)`, which matches calendar chronology across year
/// boundaries. Two-digit years map into 2000-2099.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Semester {
    year: u16,
    term: Term,
}

impl Semester {
    pub fn new(term: Term, year: u16) -> Self {
        Self { year, term }
    }

    pub fn term(&self) -> Term {
        self.term
    }

    /// Full calendar year, e.g. 2026 for `SP26`.
    pub fn year(&self) -> i64 {
        i64::from(self.year)
    }

    pub fn is_newer_than(&self, other: &Semester) -> bool {
        self > other
    }

    pub fn is_older_than(&self, other: &Semester) -> bool {
        self < other
    }

    pub fn is_same_as(&self, other: &Semester) -> bool {
        self == other
    }

    /// The four-character source code, e.g. `FA25`.
    pub fn code(&self) -> String {
        format!("{}{:02}", self.term.code(), self.year % 100)
    }
}

impl FromStr for Semester {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.is_ascii() {
            return Err(AppError::InvalidSemesterCode(s.to_string()));
        }

        let (term_part, year_part) = s.split_at(2);
        let term = Term::from_code(&term_part.to_ascii_uppercase())
            .ok_or_else(|| AppError::InvalidSemesterCode(s.to_string()))?;
        let year: u16 = year_part
            .parse()
            .map_err(|_| AppError::InvalidSemesterCode(s.to_string()))?;

        Ok(Semester::new(term, 2000 + year))
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
