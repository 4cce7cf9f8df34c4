//! Prompts for metadata extraction and report synthesis.
//!
//! Every prompt lives here so the structural contract of the report (the
//! heading skeleton below) has exactly one definition, shared by the
//! synthesizer that requests it and the audit that checks for it.

/// Headings the synthesized report must contain, in order.
///
/// The title line (`# PORTER FIVE FORCES ANALYSIS - {company}`) precedes them.
pub const REPORT_SECTIONS: &[&str] = &[
    "## EXECUTIVE SUMMARY",
    "## COMPANY INFORMATION",
    "## 1. RIVALRY AMONG EXISTING COMPETITORS",
    "## 2. THREAT OF NEW ENTRANTS",
    "## 3. THREAT OF SUBSTITUTE PRODUCTS",
    "## 4. BARGAINING POWER OF BUYERS",
    "## 5. BARGAINING POWER OF SUPPLIERS",
    "## LATEST INDUSTRY NEWS",
    "## STRATEGIC RECOMMENDATIONS",
    "## SOURCES AND STRATEGIC MONITORING",
];

/// Title heading prefix; the company name follows.
pub const REPORT_TITLE_PREFIX: &str = "# PORTER FIVE FORCES ANALYSIS - ";

/// System message for the extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You extract structured company metadata from documents. You answer with JSON only.";

/// Build the metadata-extraction prompt around an already-truncated excerpt.
pub fn extraction_prompt(document_excerpt: &str) -> String {
    format!(
        r#"Analyse the following text and extract only the requested information as JSON:

{document_excerpt}

Return ONLY a valid JSON object with exactly this structure:
{{
    "company_name": "exact name of the company",
    "business_domains": ["domain1", "domain2", "domain3"],
    "primary_sector": "main sector",
    "country": "country where the company operates",
    "mentioned_competitors": ["competitor1", "competitor2"]
}}

Make sure the JSON is valid and contains no additional text."#
    )
}

/// System message for the synthesis call.
pub const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You are an expert in corporate strategy and competitive intelligence.";

/// Everything the synthesis prompt interpolates.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInputs<'a> {
    pub company_name: &'a str,
    pub domains: &'a str,
    pub profile_json: &'a str,
    pub document_excerpt: &'a str,
    pub evidence_json: &'a str,
    pub min_chars: usize,
    pub language: &'a str,
}

/// Build the synthesis prompt with its exact section skeleton.
pub fn synthesis_prompt(inputs: &SynthesisInputs<'_>) -> String {
    let SynthesisInputs {
        company_name,
        domains,
        profile_json,
        document_excerpt,
        evidence_json,
        min_chars,
        language,
    } = *inputs;
    let s = REPORT_SECTIONS;
    format!(
        r#"Your task is to write a report in {language} of at least {min_chars} characters following Porter's Five Forces model for the company below, using all the data provided.

---

## COMPANY INFORMATION (input):
{profile_json}

## ORIGINAL DOCUMENT (excerpt):
{document_excerpt}

## COLLECTED WEB DATA:
{evidence_json}

---

Write the report using this **exact** structure. Keep every heading verbatim, in English, even when the prose is in another language:

{REPORT_TITLE_PREFIX}{company_name}

{exec}
A dense, sharp, strategic synthesis of the forces at play and of the company's overall competitive position.

{info}
- **Name**: {company_name}
- **Business domains**: {domains}
- **Positioning**: analysis based on the available data and the collected news

---

{f1}
### Recent market data
[Include at least one recent news item about a direct competitor, with date and source]

### Strategic analysis
- Number and size of competitors
- Current competitive intensity
- Innovations or differentiation identified
- Estimated market shares
- Exit barriers

---

{f2}
### Sector trends
[Include at least one news item about new companies or entering innovations, with date and source]

### Analysis
- Current barriers to entry
- Recent regulatory changes
- Capital / technology requirements
- Identified new entrants

---

{f3}
### Innovations / disruptions identified
[Use the web data to cite at least one credible technology or alternative, with date and source]

### Analysis
- Viable and emerging substitutes
- Ease of switching for customers
- Threat level for the current business model

---

{f4}
### Customer market trends
[Based on web trends, with date and source]

### Analysis
- Customer volume and diversity
- Price sensitivity and purchasing behaviour
- Customer-side substitution options
- Recent behavioural trends

---

{f5}
### Supply chain information
[Based on recent data or news, with date and source]

### Analysis
- Supplier concentration
- Input specificity
- Supply risks
- Negotiation and dependency

---

{news}
**You must include at least 3 relevant news items** for **the company's business domains**, and **at least 3 for its direct competitors**.

### Business domain news
For each item:
- **Title**
- **Publication date**
- **Source** (media / site name)
- **Summary**: at least 500 characters
- **Strategic impact**: how it affects the company

### Competitor news
For each item about a competitor:
- **Competitor concerned**
- **News title**
- **Publication date**
- **Source**
- **Summary**: at least 500 characters
- **Strategic analysis**: competitive implication, threat or opportunity

---

{recs}
### Priority actions
1. **Short term (0-6 months)**: quick operational decisions based on the latest news
2. **Medium term (6-18 months)**: strategic alignment based on sector trends
3. **Long term (18+ months)**: anticipation and durable strategic vision

### Opportunities identified
[Based on the news and data, with sources]

### Threats to monitor
[Based on the competitive or environmental analysis]

---

{sources}
- List of **official sources** (with URL)
- List of **sector news analysed** (title, date, source, link if available)
- List of **competitive sources** used
- Recommendations for continuous monitoring (indicators, frequency, tools)

---

**IMPORTANT:**
- Write **at least {min_chars} characters** (do not over-summarise).
- For every news item, include the **publication date**, the **source name**, and **the link** (if available).
- Answer only with the structured report above. No text outside the structure. No introduction or conclusion outside the report."#,
        exec = s[0],
        info = s[1],
        f1 = s[2],
        f2 = s[3],
        f3 = s[4],
        f4 = s[5],
        f5 = s[6],
        news = s[7],
        recs = s[8],
        sources = s[9],
    )
}
