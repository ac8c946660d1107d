//! Waiver & release of liability document
//!
//! Turns a validated [`WaiverSubmission`] into a paginated [`Layout`] and then
//! into PDF bytes ready for upload.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::WaiverError;
use crate::form::WaiverSubmission;
use crate::layout::{Layout, PageGeometry, PageWriter};
use crate::render;

pub const WAIVER_TITLE: &str = "Boxing Gym Waiver & Release of Liability";

pub const DISCLAIMERS: [&str; 5] = [
    "1. I acknowledge that boxing, kickboxing, or fitness activities carry inherent risks including injury or death.",
    "2. I confirm that I am physically fit and do not suffer from any condition or injury that would limit my participation.",
    "3. I agree to abide by the gym\u{2019}s rules and regulations at all times.",
    "4. I assume full responsibility for any and all injuries, losses, or damages that may occur during my participation.",
    "5. I release the gym, its owners, and staff from all liability for any injury, harm, or loss sustained.",
];

/// Signature box on the page, in points.
pub const SIGNATURE_WIDTH: f64 = 200.0;
pub const SIGNATURE_HEIGHT: f64 = 80.0;

const TITLE_FONT_SIZE: f64 = 16.0;
const BODY_FONT_SIZE: f64 = 12.0;
const TITLE_GAP: f64 = 30.0;
const SECTION_GAP: f64 = 10.0;
const SIGNATURE_GAP: f64 = 20.0;

/// A rendered waiver, ready to hand to a blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl RenderedDocument {
    pub fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    pub fn extension(&self) -> &'static str {
        "pdf"
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type(),
            BASE64.encode(&self.bytes)
        )
    }
}

/// Lay out the waiver on US Letter pages.
pub fn compose(submission: &WaiverSubmission, signed_at: DateTime<Utc>) -> Layout {
    let form = submission.form();
    let mut w = PageWriter::new(PageGeometry::letter());

    w.set_font_size(TITLE_FONT_SIZE);
    w.print_line(WAIVER_TITLE);
    // the title line already moved one line height; top up to the title gap
    let line_height = w.geometry().line_height;
    w.skip(TITLE_GAP - line_height);

    w.set_font_size(BODY_FONT_SIZE);
    w.wrap_and_print(&format!("Name: {}", form.name));
    w.wrap_and_print(&format!("Date of Birth: {}", form.date_of_birth));
    w.wrap_and_print(&format!("Phone: {}", form.phone));
    w.wrap_and_print(&format!("Email: {}", form.email));

    w.advance(SECTION_GAP);
    w.wrap_and_print(&format!("Emergency Contact: {}", form.emergency_contact_name));
    w.wrap_and_print(&format!(
        "Emergency Contact Phone: {}",
        form.emergency_contact_phone
    ));

    w.advance(SECTION_GAP);
    match form.medical_disclosure() {
        Some(description) => {
            w.wrap_and_print("Medical Issues: YES");
            w.wrap_and_print(&format!("Description: {}", description));
        }
        None => w.wrap_and_print("Medical Issues: NO"),
    }

    w.advance(SECTION_GAP);
    for disclaimer in DISCLAIMERS {
        w.wrap_and_print(disclaimer);
    }

    w.advance(SECTION_GAP);
    w.wrap_and_print(&format!(
        "Liability Agreement: {}",
        agreement_label(form.liability_agreed)
    ));
    w.wrap_and_print(&format!(
        "Rules & Safety Agreement: {}",
        agreement_label(form.rules_agreed)
    ));

    w.advance(SIGNATURE_GAP);
    if submission.signature().is_some() {
        w.place_image(SIGNATURE_WIDTH, SIGNATURE_HEIGHT);
    }

    w.advance(SECTION_GAP);
    w.print_line(&format!("Signed on: {}", format_timestamp(signed_at)));

    let layout = w.finish();
    debug!(pages = layout.page_count(), "composed waiver layout");
    layout
}

/// Compose and encode the waiver as PDF.
pub fn render_waiver(
    submission: &WaiverSubmission,
    signed_at: DateTime<Utc>,
) -> Result<RenderedDocument, WaiverError> {
    let layout = compose(submission, signed_at);
    let bytes = render::render(&layout, submission.signature())?;
    Ok(RenderedDocument {
        bytes,
        page_count: layout.page_count(),
    })
}

fn agreement_label(agreed: bool) -> &'static str {
    if agreed {
        "Agreed"
    } else {
        "Not Agreed"
    }
}

/// `3/14/2025, 9:05:07 PM UTC`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y, %-I:%M:%S %p UTC").to_string()
}
