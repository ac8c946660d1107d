//! Consent form draft and the validated waiver submission built from it

use serde::{Deserialize, Serialize};

use crate::error::WaiverError;
use crate::signature::SignatureImage;

/// Everything the member types into the consent form.
///
/// Field names on the wire match the consent endpoint's JSON body, so a form
/// saved as JSON can be loaded straight into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_phone: String,
    #[serde(default)]
    pub has_medical_issues: bool,
    /// Free text kept while the checkbox is toggled; only meaningful when
    /// `has_medical_issues` is set.
    #[serde(default)]
    pub medical_issues_description: String,
    #[serde(default)]
    pub liability_agreed: bool,
    #[serde(default)]
    pub rules_agreed: bool,
}

impl ConsentForm {
    /// Presence checks in the order the fields appear on the form.
    pub fn validate(&self) -> Result<(), WaiverError> {
        let required = [
            ("Full name", &self.name),
            ("Date of birth", &self.date_of_birth),
            ("Phone number", &self.phone),
            ("Email", &self.email),
            ("Emergency contact name", &self.emergency_contact_name),
            ("Emergency contact phone", &self.emergency_contact_phone),
        ];

        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(WaiverError::MissingField(label));
            }
        }

        if !self.liability_agreed {
            return Err(WaiverError::AgreementNotAccepted("liability release"));
        }
        if !self.rules_agreed {
            return Err(WaiverError::AgreementNotAccepted("gym rules and safety guidelines"));
        }

        Ok(())
    }

    /// The medical description, but only while the disclosure box is ticked.
    pub fn medical_disclosure(&self) -> Option<&str> {
        if self.has_medical_issues {
            Some(self.medical_issues_description.as_str())
        } else {
            None
        }
    }
}

/// A form that passed validation, paired with the captured signature.
///
/// This is the only input the layout engine and the submission endpoint
/// accept, so neither can see an incomplete form.
#[derive(Debug, Clone)]
pub struct WaiverSubmission {
    form: ConsentForm,
    signature: Option<SignatureImage>,
}

impl WaiverSubmission {
    pub fn new(form: ConsentForm, signature: Option<SignatureImage>) -> Result<Self, WaiverError> {
        form.validate()?;
        Ok(Self { form, signature })
    }

    pub fn form(&self) -> &ConsentForm {
        &self.form
    }

    pub fn signature(&self) -> Option<&SignatureImage> {
        self.signature.as_ref()
    }
}

#[cfg(test)]
pub(crate) fn sample_form() -> ConsentForm {
    ConsentForm {
        name: "Jordan Reyes".to_string(),
        email: "jordan@example.com".to_string(),
        date_of_birth: "1994-03-12".to_string(),
        phone: "555-0142".to_string(),
        emergency_contact_name: "Sam Reyes".to_string(),
        emergency_contact_phone: "555-0199".to_string(),
        has_medical_issues: false,
        medical_issues_description: String::new(),
        liability_agreed: true,
        rules_agreed: true,
    }
}
