use regex::Regex;

use crate::models::EnquiryTopic;

// Keyword tables for routing free-text enquiries. First table entry wins
// ties, so the more operationally urgent topics sit first.
const TOPIC_KEYWORDS: &[(EnquiryTopic, &[&str])] = &[
    (
        EnquiryTopic::Appointments,
        &[
            "appointment", "appointments", "booking", "book", "reschedule", "cancel", "slot",
            "doctor", "consultation", "availability",
        ],
    ),
    (
        EnquiryTopic::Billing,
        &[
            "bill", "billing", "invoice", "payment", "pay", "fee", "fees", "charge", "refund",
            "subsidy", "insurance", "medisave", "chas",
        ],
    ),
    (
        EnquiryTopic::Services,
        &[
            "screening", "vaccination", "vaccine", "jab", "service", "services", "checkup",
            "check-up", "test", "results", "report", "referral",
        ],
    ),
    (
        EnquiryTopic::Feedback,
        &[
            "feedback", "complaint", "complain", "suggestion", "suggest", "experience",
            "compliment", "review",
        ],
    ),
];

/// Classify an enquiry message by keyword hits; unmatched text is General.
pub fn classify_topic(message: &str) -> EnquiryTopic {
    let lowered = message.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| !t.is_empty())
        .collect();

    let mut best = EnquiryTopic::General;
    let mut best_hits = 0usize;

    for (topic, keywords) in TOPIC_KEYWORDS {
        let hits = tokens.iter().filter(|t| keywords.contains(*t)).count();
        if hits > best_hits {
            best_hits = hits;
            best = *topic;
        }
    }

    best
}

/// Team inbox an enquiry topic lands in.
pub fn route_team(topic: EnquiryTopic) -> &'static str {
    match topic {
        EnquiryTopic::Appointments => "scheduling-team",
        EnquiryTopic::Billing => "billing-team",
        EnquiryTopic::Services => "clinical-services",
        EnquiryTopic::Feedback => "patient-experience",
        EnquiryTopic::General => "front-desk",
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let pattern = Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("email pattern is valid");
    pattern.is_match(email)
}
