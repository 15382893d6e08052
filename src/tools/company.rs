use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub const TOOL_NAME: &str = "get_company_details";
pub const TOOL_DESCRIPTION: &str = "Returns the company's name, address, contact details, \
    website, legal policy links, mission, vision and values.";

const WEBSITE: &str = "https://www.globaltechsolutions.com";

/// The tool takes no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CompanyDetailsParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDetails {
    pub name: String,
    pub address: String,
    pub contact: String,
    pub email: String,
    pub website: String,
    pub privacy_policy: String,
    pub terms_and_conditions: String,
    pub mission: String,
    pub vision: String,
    pub values: Vec<String>,
}

impl CompanyDetails {
    pub fn current() -> Self {
        Self {
            name: "Global Tech Solutions Inc.".to_string(),
            address: "456 Digital Avenue, Silicon Valley, CA 94025".to_string(),
            contact: "+1-555-0123".to_string(),
            email: "info@globaltechsolutions.com".to_string(),
            website: WEBSITE.to_string(),
            privacy_policy: format!("{WEBSITE}/privacy"),
            terms_and_conditions: format!("{WEBSITE}/terms"),
            mission: "Empowering businesses with cutting-edge technology solutions that drive \
                growth and innovation."
                .to_string(),
            vision: "To create a digitally transformed world where technology enhances every \
                aspect of business operations."
                .to_string(),
            values: [
                "Excellence in Service",
                "Technological Innovation",
                "Client Partnership",
                "Ethical Business Practices",
                "Continuous Learning",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

pub fn get_company_details(_args: Value) -> Result<Value> {
    Ok(serde_json::to_value(CompanyDetails::current())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_details_record() {
        let value = get_company_details(Value::Null).expect("tool should succeed");
        let details: CompanyDetails = serde_json::from_value(value).expect("round trip");
        assert_eq!(details.privacy_policy, "https://www.globaltechsolutions.com/privacy");
        assert_eq!(details.terms_and_conditions, "https://www.globaltechsolutions.com/terms");
        assert_eq!(details.values.len(), 5);
    }
}
