use serde::{Deserialize, Serialize};

/// Condensed job-posting context forwarded to the answer model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobContext {
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub job_posted: Option<String>,
    pub job_description: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub preferred_skills: Option<Vec<String>>,
    pub education_requirements: Option<Vec<String>>,
    pub experience_requirements: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub open_to_visa_sponsorship: Option<bool>,
    pub job_site_type: Option<String>,
}
