use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{MovieRecord, RecommendationQuery, ReleaseDateBound},
};

/// A single metadata predicate on the movie collection
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// `rating >= value`
    MinRating(f64),
    /// `release_date >= year`; release dates are stored as numeric years
    ReleasedFrom(i32),
    /// Case-insensitive text match against any genre entry
    Genre(String),
}

/// Conjunction of conditions. Never empty: an unconstrained search is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieFilter {
    pub must: Vec<FilterCondition>,
}

impl MovieFilter {
    /// Evaluates the filter against a movie's payload
    pub fn matches(&self, movie: &MovieRecord) -> bool {
        self.must.iter().all(|condition| match condition {
            FilterCondition::MinRating(min) => movie.rating.is_some_and(|r| r >= *min),
            FilterCondition::ReleasedFrom(year) => {
                movie.release_date.is_some_and(|y| y >= *year)
            }
            FilterCondition::Genre(genre) => movie.has_genre(genre),
        })
    }
}

/// Builds the optional catalog filter for a recommendation query
///
/// Returns `Ok(None)` when no constraint is given.
pub fn build_filter(query: &RecommendationQuery) -> AppResult<Option<MovieFilter>> {
    let mut must = Vec::new();

    if let Some(raw) = &query.min_rating {
        must.push(FilterCondition::MinRating(parse_min_rating(raw)?));
    }

    if let Some(bound) = &query.min_release_date {
        must.push(FilterCondition::ReleasedFrom(parse_release_year(bound)?));
    }

    if let Some(genre) = query.genre.as_deref().map(str::trim) {
        if !genre.is_empty() {
            must.push(FilterCondition::Genre(genre.to_lowercase()));
        }
    }

    if must.is_empty() {
        Ok(None)
    } else {
        Ok(Some(MovieFilter { must }))
    }
}

/// Accepts a finite number or a string holding one
fn parse_min_rating(raw: &Value) -> AppResult<f64> {
    let rating = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    rating.filter(|r| r.is_finite()).ok_or_else(|| {
        AppError::InvalidInput(format!("min_rating must be a finite number, got {}", raw))
    })
}

/// Accepts `2010`, `"2010"`, or a full `"2010-07-16"` date
fn parse_release_year(bound: &ReleaseDateBound) -> AppResult<i32> {
    match bound {
        ReleaseDateBound::Year(year) => Ok(*year),
        ReleaseDateBound::Text(text) => {
            let text = text.trim();
            if let Ok(year) = text.parse::<i32>() {
                return Ok(year);
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|date| date.year())
                .map_err(|_| {
                    AppError::InvalidInput(format!(
                        "min_release_date must be a year or YYYY-MM-DD date, got '{}'",
                        text
                    ))
                })
        }
    }
}
