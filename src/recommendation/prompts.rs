//! Prompt templates for the two recommendation calls.

/// First call: free-form survivability analysis for `location`.
pub fn analysis_prompt(location: &str) -> String {
    format!(
        r#"Produce a thorough agricultural analysis for {location}.

1. Crops
   - Name at least 10 crops commonly grown in {location}.
   - For every crop give:
     a. Description: a short explanation for someone who has never grown it.
     b. Challenges: the 3-5 most serious challenges the crop faces in {location}.
     c. Survivability percentage: one estimated value between 0 and 100. Give a single number, never a range.
     d. Reasons for the survivability value: the factors that drive the percentage.

2. Local conditions
   - Describe the environmental conditions of {location} that matter for survival (climate, soil type, water availability).

3. Layout
   - One clear heading per crop.
   - Bullet points for challenges and reasons.

Example for one crop:
**Crop Name**: [Crop Name]
- Description: [Crop Description]
- Challenges:
    - [Challenge 1]
    - [Challenge 2]
    - [Challenge 3]
- Survivability Percentage: [X%]
- Reason for Survivability Value:
    - [Reason 1]
    - [Reason 2]
    - [Reason 3]

Keep everything specific to {location}. Challenges and reasons must come only from the natural conditions of {location}; do not mention human or infrastructural factors."#
    )
}

/// Second call: re-tag `analysis` into `<crop>` blocks.
pub fn reformat_prompt(analysis: &str) -> String {
    format!(
        r#"Rewrite the agricultural analysis below using EXACTLY the tags described here.

{analysis}

Rules:
1. Every crop gets these tags, in this order:
   - <crop>full crop name</crop>
   - <description>description of the crop</description>
   - <challenges>one challenge per line, each starting with "- "</challenges>
   - <survivability>the percentage only, no explanation</survivability>
   - <reasons>one reason per line, each starting with "- "</reasons>
2. Include every crop from the analysis.
3. Use no Markdown and no tags other than these.
4. Leave one empty line between crops.

Example:
<crop>Almonds</crop>
<description>Almonds are nut trees that need warm, dry climates, well-drained soil and a period of winter chill.</description>
<challenges>
- Heavy rainfall and waterlogged soil that almond roots cannot tolerate
- Constant humidity that encourages root rot and blight
- Acidic soils, while almonds prefer neutral to slightly alkaline pH
</challenges>
<survivability>20%</survivability>
<reasons>
- Poor drainage starves roots of oxygen
- Humidity keeps disease pressure high all season
- Too few chilling hours disrupt flowering
</reasons>"#
    )
}
