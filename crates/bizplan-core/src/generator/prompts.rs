//! Prompt text sent to language-model backends.

use super::GenerationInput;

/// The sections the analysis call must score, in order.
pub const EVALUATED_SECTIONS: [&str; 9] = [
    "Executive Summary",
    "Market Analysis",
    "Product and Solution",
    "Business Model",
    "Operations and Team",
    "Strategic Planning",
    "Financial Plan",
    "Sustainability and ESG",
    "Risks and Mitigations",
];

const WRITING_RULES: &str = "\
1. Write entirely in Markdown, with well-formed headings, lists and sections.
2. Do not mention limitations, inferences or missing data; complete the text naturally.
3. Where information is missing, fill it in with sound reasoning grounded in the sector, as a real consultant would.
4. Use market data, real practices and plausible justifications.
5. Keep a professional, fluent, strategic and persuasive tone.
6. Do not include instructions, bracketed notes or internal commentary in the output.";

const PLAN_STRUCTURE: &str = "\
# 1. Executive Summary
Overview of the startup: problem, solution, value proposition, target audience, business model and differentiators.
## 1.1 Company Overview
## 1.2 Problem and Opportunity
## 1.3 Value Proposition
## 1.4 Business Model
## 1.5 Competitive Advantages

# 2. Market Analysis
Market size, trends, customer behaviour and competition.
## 2.1 Industry Overview
## 2.2 Relevant Trends
## 2.3 Segmentation and Target Audience
## 2.4 Customer Behaviour
## 2.5 Competitive Landscape
## 2.6 Market Opportunities

# 3. Product and Solution
## 3.1 The Problem
## 3.2 The Proposed Solution
## 3.3 Development Stage
## 3.4 Key Features
## 3.5 Innovation and Differentiators

# 4. Business Model
## 4.1 Revenue Model
## 4.2 Acquisition and Distribution Channels
## 4.3 Customer Relationships
## 4.4 Go-to-Market Strategy

# 5. Operations and Team
## 5.1 Organisational Structure
## 5.2 Roles and Responsibilities
## 5.3 Operational Processes
## 5.4 Team Expansion Plan

# 6. Strategic Planning
## 6.1 SWOT Analysis
## 6.2 PESTEL Analysis
## 6.3 Strategic Drivers
## 6.4 Roadmap (12, 24 and 36 months, with milestones)

# 7. Financial Plan
## 7.1 Cost Structure
## 7.2 Financial Assumptions
## 7.3 Revenue Projection
## 7.4 Expense Projection
## 7.5 Break-even Point
## 7.6 Expected Profitability
## 7.7 Funding Requirements and Use of Funds

# 8. Sustainability and ESG
## 8.1 Environmental Impact
## 8.2 Social Impact
## 8.3 Governance and Compliance

# 9. Risks and Mitigations
## 9.1 Market Risks
## 9.2 Operational Risks
## 9.3 Technology Risks
## 9.4 Mitigation Strategies

# 10. Conclusion and Final Pitch
Closing summary and an investor-ready pitch of at most six lines.";

/// Prompt for the full plan document.
pub fn plan_prompt(input: &GenerationInput) -> String {
    format!(
        "You are a senior strategy, innovation and startup consultant.\n\
         Write a COMPLETE business plan, coherent and investor-ready, from the data below.\n\n\
         --- STARTUP DATA ---\n\
         NAME: {name}\n\
         ELEVATOR PITCH: {description}\n\
         SECTOR: {sector}\n\
         BUSINESS MODEL: {business_model}\n\n\
         Onboarding answers:\n\
         {answers}\n\
         --- END OF DATA ---\n\n\
         GENERAL RULES\n\
         {WRITING_RULES}\n\
         7. Return only the plan in Markdown, nothing else.\n\n\
         MANDATORY STRUCTURE\n\
         {PLAN_STRUCTURE}\n",
        name = input.name,
        description = input.description,
        sector = input.sector,
        business_model = input.business_model,
        answers = input.answers,
    )
}

/// Prompt for the executive summary of an existing plan.
pub fn summary_prompt(plan_markdown: &str) -> String {
    format!(
        "You are a senior consultant.\n\n\
         GENERAL RULES\n\
         {WRITING_RULES}\n\
         7. Return only the executive summary, nothing else.\n\n\
         From the business plan below, write a concise, direct and persuasive executive \
         summary explaining the business, the opportunity and the differentiator. \
         Use at most three paragraphs.\n\n\
         BUSINESS PLAN:\n\
         {plan_markdown}\n"
    )
}

/// Prompt for the scored section analysis of an existing plan.
pub fn analysis_prompt(plan_markdown: &str) -> String {
    let sections = EVALUATED_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {name}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a rigorous business plan evaluator and angel investor.\n\
         Evaluate the {count} strategic sections of the business plan below. For each section \
         give a score from 0 to 100 (how complete, realistic and well structured it is) and \
         one or two practical suggestions for improvement.\n\n\
         Sections to evaluate:\n\
         {sections}\n\n\
         Respond STRICTLY with valid JSON in exactly this shape:\n\
         {{\n  \"overall_score\": 85,\n  \"sections_analysis\": [\n    {{\n      \
         \"section_name\": \"1. {first}\",\n      \"score\": 90,\n      \
         \"suggestions\": [\"Clarify the value proposition.\"]\n    }}\n  ]\n}}\n\
         Return all {count} sections inside sections_analysis.\n\n\
         BUSINESS PLAN:\n\
         {plan_markdown}\n",
        count = EVALUATED_SECTIONS.len(),
        first = EVALUATED_SECTIONS[0],
    )
}
