//! Keyword classification of inbound messages into lead branches.
//!
//! Rules are checked in a fixed priority order and the first match wins.
//! Anything that matches no rule lands in [`Branch::UnknownLeads`].

use serde::{Deserialize, Serialize};

/// A categorical bucket that conversations are routed into.
///
/// Each branch owns one storage collection and one export tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// E-commerce website enquiries.
    ECommerceLeads,
    /// Enquiries about the 3999 static website package.
    StaticLeads,
    /// Enquiries from the 4999 digital marketing campaign.
    DigitalMarketing4999,
    /// Messages that matched no keyword rule.
    UnknownLeads,
}

impl Branch {
    /// Every branch, in classifier priority order.
    pub const ALL: [Branch; 4] = [
        Branch::ECommerceLeads,
        Branch::StaticLeads,
        Branch::DigitalMarketing4999,
        Branch::UnknownLeads,
    ];

    /// Collection (and tab) name used when no override is configured.
    pub fn default_collection(&self) -> &'static str {
        match self {
            Branch::ECommerceLeads => "E-Commerce_website_Leads",
            Branch::StaticLeads => "Static_Leads",
            Branch::DigitalMarketing4999 => "Digital_Marketing_4999",
            Branch::UnknownLeads => "Unknown_Leads",
        }
    }

    /// Short identifier used in URLs and configuration lists.
    pub fn slug(&self) -> &'static str {
        match self {
            Branch::ECommerceLeads => "ecommerce",
            Branch::StaticLeads => "static",
            Branch::DigitalMarketing4999 => "digital_marketing",
            Branch::UnknownLeads => "unknown",
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl std::str::FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Branch::ALL
            .into_iter()
            .find(|b| {
                wanted == b.slug()
                    || wanted == b.default_collection().to_lowercase()
                    || wanted == format!("{:?}", b).to_lowercase()
            })
            .ok_or_else(|| format!("Unknown branch: {}", s))
    }
}

const ECOMMERCE_KEYWORDS: &[&str] = &["e-commerce", "ecommerce", "e commerce"];
const STATIC_KEYWORDS: &[&str] = &["3999 website"];
/// Canned opener sent by the digital marketing ad's click-to-chat button.
const DIGITAL_MARKETING_KEYWORDS: &[&str] = &["hello need info about digital marketing"];

/// Classify a message into its branch.
pub fn classify(message: &str) -> Branch {
    let normalized = message.to_lowercase();
    let normalized = normalized.trim();

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| normalized.contains(k));

    if contains_any(ECOMMERCE_KEYWORDS) {
        Branch::ECommerceLeads
    } else if contains_any(STATIC_KEYWORDS) {
        Branch::StaticLeads
    } else if contains_any(DIGITAL_MARKETING_KEYWORDS) {
        Branch::DigitalMarketing4999
    } else {
        Branch::UnknownLeads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecommerce_variants() {
        for text in [
            "I want an ecommerce site",
            "ECOMMERCE",
            "Need E-Commerce website",
            "  e commerce store please ",
            "Tell me about your E Commerce plans",
        ] {
            assert_eq!(classify(text), Branch::ECommerceLeads, "text: {text:?}");
        }
    }

    #[test]
    fn test_static_website() {
        assert_eq!(classify("Interested in the 3999 Website offer"), Branch::StaticLeads);
    }

    #[test]
    fn test_digital_marketing_prompt() {
        assert_eq!(
            classify("Hello Need info about Digital Marketing"),
            Branch::DigitalMarketing4999
        );
        assert_eq!(
            classify("hello need info about digital marketing!!"),
            Branch::DigitalMarketing4999
        );
    }

    #[test]
    fn test_priority_order() {
        // ecommerce outranks the static package keyword
        assert_eq!(
            classify("3999 website or ecommerce?"),
            Branch::ECommerceLeads
        );
        assert_eq!(
            classify("Hello Need info about Digital Marketing and the 3999 website"),
            Branch::StaticLeads
        );
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(classify("hi"), Branch::UnknownLeads);
        assert_eq!(classify("digital marketing"), Branch::UnknownLeads);
        assert_eq!(classify("3999"), Branch::UnknownLeads);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(classify(""), Branch::UnknownLeads);
        assert_eq!(classify("   \n\t "), Branch::UnknownLeads);
    }

    #[test]
    fn test_branch_from_str() {
        assert_eq!("ecommerce".parse::<Branch>().unwrap(), Branch::ECommerceLeads);
        assert_eq!("Static_Leads".parse::<Branch>().unwrap(), Branch::StaticLeads);
        assert_eq!(
            "DigitalMarketing4999".parse::<Branch>().unwrap(),
            Branch::DigitalMarketing4999
        );
        assert_eq!(" UNKNOWN ".parse::<Branch>().unwrap(), Branch::UnknownLeads);
        assert!("sales".parse::<Branch>().is_err());
    }

    #[test]
    fn test_branch_display_is_slug() {
        assert_eq!(Branch::DigitalMarketing4999.to_string(), "digital_marketing");
    }
}
