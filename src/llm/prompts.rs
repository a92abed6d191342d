//! Prompt templates for chat extraction, insights, quotes, and the coach.
//!
//! Templates use `{name}` placeholders filled by the helpers below.

/// Context used when a user has no chat history yet.
pub const FIRST_CONVERSATION: &str = "First conversation";

const CHAT_PROMPT: &str = r#"
You are a personal tracking assistant. Analyze the user's message and extract tracking data if present.

User message: "{message}"

Extract data in this JSON format:
{
    "response": "Your friendly response to the user",
    "extracted_data": {
        "sleep_hours": null,
        "water_liters": null,
        "gym_session": null,
        "mood": null,
        "work_hours": null,
        "learning_hours": null
    }
}

Rules:
- Only extract data that's clearly mentioned
- Be conversational and encouraging
- If asking a question, make it specific and helpful
- IMPORTANT: Return ONLY the JSON object, no markdown formatting

Previous context: {context}
"#;

/// System message for chat-completions style providers, where the user text
/// travels as its own message.
pub const CHAT_SYSTEM_PROMPT: &str = r#"You are a personal tracking assistant. Analyze the user's message and extract tracking data if present.

Extract data in this JSON format:
{
    "response": "Your friendly response to the user",
    "extracted_data": {
        "sleep_hours": null,
        "water_liters": null,
        "gym_session": null,
        "mood": null,
        "work_hours": null,
        "learning_hours": null
    }
}

Rules:
- Only extract data that's clearly mentioned
- Be conversational and encouraging
- IMPORTANT: Return ONLY the JSON object, no markdown formatting"#;

const INSIGHTS_PROMPT: &str = r#"
Analyze this tracking data and provide 2-3 helpful insights:

Data: {tracking_data}

Return insights as a JSON array of strings. Focus on:
- Patterns and correlations
- Achievements and progress
- Helpful suggestions

Format: ["insight 1", "insight 2", "insight 3"]
"#;

const DAILY_QUOTE_PROMPT: &str = r#"
Generate one powerful, personalized motivational quote for {user_name} who is working on personal growth and building habits.

Requirements:
- Maximum 12-15 words
- MUST include the name "{user_name}" naturally in the quote
- Should feel genuine and actionable, not cheesy
- Focus on: consistency, small steps, discipline, growth mindset, or self-improvement
- Can include ONE relevant emoji at the end
- No author attribution

Good examples:
- "{user_name}, small daily improvements compound into remarkable transformations. 🌱"
- "Every habit you build, {user_name}, is proof of your commitment to growth. 💪"
- "{user_name}, the person you become tomorrow starts with today's choices. ✨"
- "Keep going, {user_name}. Your consistency is your superpower. 🔥"

Return ONLY the quote text, nothing else.
"#;

const DAILY_QUOTE_FALLBACK: &str = "Small steps every day lead to big changes, {user_name}. 🌱";

const CONVERSATION_PARTNER_PROMPT: &str = r#"
You are a friendly conversation partner. The user is talking to you casually.

The user said: "{message}"

Respond naturally like a friend would. Be:
- Friendly and warm
- Conversational (not formal)
- Brief (1-3 sentences max)
- Interested in what they're saying

Don't give grammar lessons or corrections. Just have a normal friendly chat!
"#;

/// Insights returned whenever the model output cannot be used.
pub const FALLBACK_INSIGHTS: [&str; 3] = [
    "Keep tracking to see patterns!",
    "Consistency is key to progress.",
    "Great job staying engaged!",
];

/// Reply sent to the user when the chat model call itself failed.
pub const CHAT_APOLOGY: &str = "I'm having trouble processing that. Could you rephrase?";

/// Single-prompt chat template embedding both message and context.
pub fn chat_prompt(message: &str, context: &str) -> String {
    fill(CHAT_PROMPT, &[("message", message), ("context", context)])
}

/// Substitutes `{name}` placeholders in a single left-to-right pass, so text
/// inserted for one placeholder is never scanned again. Other braces are
/// copied through.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn insights_prompt(tracking_data: &str) -> String {
    INSIGHTS_PROMPT.replace("{tracking_data}", tracking_data)
}

pub fn daily_quote_prompt(user_name: &str) -> String {
    DAILY_QUOTE_PROMPT.replace("{user_name}", user_name)
}

pub fn daily_quote_fallback(user_name: &str) -> String {
    DAILY_QUOTE_FALLBACK.replace("{user_name}", user_name)
}

pub fn conversation_partner_prompt(message: &str) -> String {
    CONVERSATION_PARTNER_PROMPT.replace("{message}", message)
}

pub fn fallback_insights() -> Vec<String> {
    FALLBACK_INSIGHTS.iter().map(|s| s.to_string()).collect()
}

/// Normalizes an optional chat context, treating blank history as the first
/// conversation.
pub fn context_or_first(context: Option<&str>) -> &str {
    context
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(FIRST_CONVERSATION)
}
