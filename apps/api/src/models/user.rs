use serde::{Deserialize, Serialize};

/// Condensed user profile forwarded to the answer model: identity, contact,
/// location, work authorization, EEO disclosures, and preferences. Every
/// field is optional — the profile may be sparse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub other_url: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub authorized_to_work_in_us: Option<bool>,
    pub visa_sponsorship: Option<bool>,
    pub visa_sponsorship_type: Option<String>,
    pub desired_salary: Option<f64>,
    pub desired_location: Option<Vec<String>>,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub veteran_status: Option<String>,
    pub disability_status: Option<String>,
}
