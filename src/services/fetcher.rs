// src/services/fetcher.rs

//! Section fetcher.
//!
//! A section is assembled from three upstream calls: course details from
//! Howdy, the instructor list from Howdy, and the seat table scraped from
//! Compass.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::FetchError;
use crate::models::{FetcherConfig, Section, SectionInfo, Snapshot};
use crate::utils::endpoint;
use crate::utils::http::truncate_body;

/// Instructor shown when the section has none on record.
pub const UNASSIGNED_INSTRUCTOR: &str = "Not assigned";

const PRIMARY_MARKER: &str = "(P)";

/// Retrieves the current state of one tracked resource.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, resource_id: &str) -> Result<Section, FetchError>;
}

/// Seat table as shown on the Compass detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatCounts {
    pub capacity: i64,
    pub actual: i64,
    pub remaining: i64,
}

#[derive(Debug, Default, Deserialize)]
struct CourseDetails {
    #[serde(rename = "SUBJECT_CODE", default)]
    subject: Option<String>,

    #[serde(rename = "COURSE_NUMBER", default)]
    course_number: Option<String>,

    #[serde(rename = "COURSE_TITLE", default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstructorEntry {
    #[serde(rename = "NAME")]
    name: String,
}

/// Fetches sections for one term from the university endpoints.
pub struct HowdyFetcher {
    client: Client,
    term: String,
    howdy_url: String,
    compass_url: String,
}

impl HowdyFetcher {
    pub fn new(client: Client, term: impl Into<String>, config: &FetcherConfig) -> Self {
        Self {
            client,
            term: term.into(),
            howdy_url: config.howdy_url.clone(),
            compass_url: config.compass_url.clone(),
        }
    }

    async fn course_details(&self, crn: &str) -> Result<Value, FetchError> {
        let url = endpoint(&self.howdy_url, "api/course-section-details")
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("term", self.term.as_str()),
                ("subject", ""),
                ("course", ""),
                ("crn", crn),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!("howdy returned {status}")));
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::Empty);
        }
        let details: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(format!("{e}: {}", truncate_body(&body, 80))))?;
        if is_blank(&details) {
            return Err(FetchError::Empty);
        }
        Ok(details)
    }

    /// Primary instructor, `None` when the section has none on record.
    async fn instructor(&self, crn: &str) -> Result<Option<String>, FetchError> {
        let url = endpoint(&self.howdy_url, "api/section-meeting-times-with-profs")
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        let body = json!({ "term": self.term, "subject": null, "course": null, "crn": crn });

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!(
                "instructor lookup returned {status}"
            )));
        }
        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text)
            .map_err(|e| FetchError::Malformed(format!("{e}: {}", truncate_body(&text, 80))))?;
        Ok(parse_instructor(&payload))
    }

    async fn seats(&self, crn: &str) -> Result<SeatCounts, FetchError> {
        let url = endpoint(&self.compass_url, "pls/PROD/bwykschd.p_disp_detail_sched")
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .query(&[("term_in", self.term.as_str()), ("crn_in", crn)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!("compass returned {status}")));
        }
        let html = response.text().await?;
        parse_seats(&html)
    }
}

#[async_trait]
impl ResourceFetcher for HowdyFetcher {
    async fn fetch(&self, resource_id: &str) -> Result<Section, FetchError> {
        let details = self.course_details(resource_id).await?;
        let course: CourseDetails = serde_json::from_value(details).unwrap_or_default();

        let instructor = self
            .instructor(resource_id)
            .await?
            .unwrap_or_else(|| UNASSIGNED_INSTRUCTOR.to_string());
        let seats = self.seats(resource_id).await?;

        log::debug!(
            "CRN {resource_id}: {}/{} filled, {} remaining, instructor {instructor}",
            seats.actual,
            seats.capacity,
            seats.remaining
        );

        Ok(Section {
            info: SectionInfo {
                crn: resource_id.to_string(),
                subject: course.subject.unwrap_or_default(),
                course_number: course.course_number.unwrap_or_default(),
                title: course.title.unwrap_or_default(),
            },
            snapshot: Snapshot {
                seats: Some(seats.remaining),
                instructor: Some(instructor),
            },
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Parse the seat table out of a Compass detail page.
///
/// The page lays seats out as `td.dddefault` cells: capacity, actual and
/// remaining at positions 1, 2 and 3. A page without those cells means the
/// CRN does not exist for the term.
pub fn parse_seats(html: &str) -> Result<SeatCounts, FetchError> {
    let document = Html::parse_document(html);
    let cell_sel = parse_selector("td.dddefault")?;

    let cells: Vec<String> = document
        .select(&cell_sel)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect();

    if cells.is_empty() {
        return Err(FetchError::Empty);
    }
    if cells.len() < 4 {
        return Err(FetchError::Malformed(format!(
            "expected at least 4 seat cells, found {}",
            cells.len()
        )));
    }

    let number = |index: usize| -> Result<i64, FetchError> {
        cells[index]
            .parse::<i64>()
            .map_err(|_| FetchError::Malformed(format!("seat cell {index} is {:?}", cells[index])))
    };

    Ok(SeatCounts {
        capacity: number(1)?,
        actual: number(2)?,
        remaining: number(3)?,
    })
}

/// Pull the primary instructor's name out of the meeting-times payload.
///
/// The instructor list arrives as a JSON document encoded inside a string
/// field; names carry a trailing `(P)` marker for the primary instructor.
pub fn parse_instructor(payload: &Value) -> Option<String> {
    let raw = payload.get("SWV_CLASS_SEARCH_INSTRCTR_JSON")?;
    let entries: Vec<InstructorEntry> = match raw {
        Value::String(encoded) => serde_json::from_str(encoded).ok()?,
        Value::Array(_) => serde_json::from_value(raw.clone()).ok()?,
        _ => return None,
    };
    let name = entries.into_iter().next()?.name;
    let name = name.trim().trim_end_matches(PRIMARY_MARKER).trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::Malformed(format!("selector {selector}: {e}")))
}
