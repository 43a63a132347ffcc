//! System prompt rendering.
//!
//! Every completion request starts with a system message rendered from the
//! customer's profile. The layout is fixed: a channel role statement, then
//! the optional profile lines in a fixed order (tone, hours, products, FAQs),
//! then, for the support channel only, the structured-reply contract. Absent
//! fields are skipped and never reorder the remaining lines.

use crate::domain::conversation::Channel;
use crate::domain::profile::CustomerProfile;

pub const FAQ_QUESTION_PREFIX: &str = "Q: ";
pub const FAQ_ANSWER_PREFIX: &str = "A: ";

struct ChannelTemplate {
    role: fn(&str) -> Vec<String>,
    tone_label: &'static str,
    hours_label: &'static str,
    products_label: &'static str,
    faq_header: &'static str,
}

const SIMULATION: ChannelTemplate = ChannelTemplate {
    role: simulation_role,
    tone_label: "Desired voice tone",
    hours_label: "Opening hours",
    products_label: "Products/services",
    faq_header: "Known FAQs:",
};

const MESSAGING_BRIDGE: ChannelTemplate = ChannelTemplate {
    role: messaging_role,
    tone_label: "Voice tone",
    hours_label: "Service hours",
    products_label: "Available products/services",
    faq_header: "Knowledge base summary:",
};

const SUPPORT: ChannelTemplate = ChannelTemplate {
    role: support_role,
    tone_label: "Use the voice tone",
    hours_label: "Customer opening hours",
    products_label: "Customer products/services",
    faq_header: "Customer FAQs:",
};

fn simulation_role(company: &str) -> Vec<String> {
    vec![
        format!("You are a virtual attendant representing {company}."),
        "Follow the customer's voice tone and answer in a helpful, concise way.".to_string(),
    ]
}

fn messaging_role(company: &str) -> Vec<String> {
    vec![
        "You are answering customers over WhatsApp Business.".to_string(),
        format!("Introduce yourself as a representative of {company}."),
        "Reply with short, friendly messages and clear instructions.".to_string(),
    ]
}

fn support_role(company: &str) -> Vec<String> {
    vec![
        "You are an internal support agent helping customers use the platform dashboard."
            .to_string(),
        "Give step-by-step instructions whenever possible.".to_string(),
        format!("Current customer: {company}."),
    ]
}

const SUPPORT_CONTRACT: &[&str] = &[
    "Decide whether the request must be escalated to a human. Escalate when there is financial risk, a serious complaint, or a request outside the standard scope.",
    "Reply exclusively with a JSON object with the keys `response` (string) and `escalate` (boolean).",
];

fn template(channel: Channel) -> &'static ChannelTemplate {
    match channel {
        Channel::Simulation => &SIMULATION,
        Channel::MessagingBridge => &MESSAGING_BRIDGE,
        Channel::Support => &SUPPORT,
    }
}

/// Renders the system instruction for `channel`. Pure: identical input
/// always yields identical output.
pub fn build_system_prompt(profile: &CustomerProfile, channel: Channel) -> String {
    let template = template(channel);
    let mut lines = (template.role)(profile.company_name.trim());

    if let Some(tone) = non_empty(profile.voice_tone.as_deref()) {
        lines.push(format!("{}: {tone}.", template.tone_label));
    }
    if let Some(hours) = non_empty(profile.opening_hours.as_deref()) {
        lines.push(format!("{}: {hours}.", template.hours_label));
    }

    let products: Vec<&str> =
        profile.products.iter().map(|product| product.trim()).filter(|p| !p.is_empty()).collect();
    if !products.is_empty() {
        lines.push(format!("{}: {}.", template.products_label, products.join(", ")));
    }

    if !profile.faqs.is_empty() {
        lines.push(template.faq_header.to_string());
        for faq in &profile.faqs {
            lines.push(format!(
                "{FAQ_QUESTION_PREFIX}{}\n{FAQ_ANSWER_PREFIX}{}",
                faq.question.trim(),
                faq.answer.trim()
            ));
        }
    }

    if channel == Channel::Support {
        lines.extend(SUPPORT_CONTRACT.iter().map(|line| line.to_string()));
    }

    lines.join("\n")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
