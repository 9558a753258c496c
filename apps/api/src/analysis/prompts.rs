// Resume analysis prompt templates.
// All prompts for the analysis pipeline are defined here; `{content}` is the
// only placeholder and is filled by `llm_client::prompts::render`.

use crate::models::block::BlockType;

pub const SEGMENTATION_PROMPT: &str = r#"You are an expert HR professional and resume parser. Divide the resume below into blocks.

RESUME:
{content}

BLOCK TYPES:
1. "projects" - each job / work experience / project is a SEPARATE block
2. "skills" - ONLY a dedicated skills section; never skills mentioned inside projects
3. "education" - education, certifications, courses
4. "languages" - spoken language skills
5. "summary" - everything else: contact details, location, objectives, availability

RULES:
- Keep the original text of each block; do not summarize or rewrite it
- Number blocks with "order" in the sequence they appear in the resume, starting at 0
- Omit block types that do not exist in the resume

OUTPUT SCHEMA:
{
  "blocks": [
    {"type": "summary", "order": 0, "content": "..."},
    {"type": "projects", "order": 1, "content": "job 1 text"},
    {"type": "projects", "order": 2, "content": "job 2 text"},
    {"type": "skills", "order": 3, "content": "..."}
  ]
}"#;

pub const PROJECTS_PROMPT: &str = r#"You are an expert HR professional and job title cataloger. Analyze this single work experience.

WORK EXPERIENCE:
{content}

Return JSON with:
- skills: skills used in this position, each {"name", "score"} with score 0-100
- roles: roles held, each with:
  "title" (full standard job title, no abbreviations),
  "employer" (company name and country only),
  "start" ("YYYY-MM"), "end" ("YYYY-MM" or "present"),
  "duration" (exact, e.g. "1 year, 9 months"),
  "score" (0-100), "category" (list of tags, e.g. ["Development"])

SCORING:
- Recent and long-running work scores higher
- Skills from the last 5 years: 70-100; 6-10 years ago: 50-80; 11-15 years: 30-60; older: 5-40

OUTPUT SCHEMA:
{
  "skills": [{"name": "Project Management", "score": 85}],
  "roles": [{"title": "Senior Software Developer", "employer": "Company (Country)",
             "start": "2023-10", "end": "present", "duration": "1 year, 9 months",
             "score": 85, "category": ["Development", "Software Engineering"]}]
}"#;

pub const SKILLS_PROMPT: &str = r#"Analyze this skills section and score each skill.

SKILLS SECTION:
{content}

SCORING:
- Individual skills start at 10
- Related skills reinforce each other: +10 to +30
- Maximum score is 100

OUTPUT SCHEMA:
{
  "skills": [{"name": "Project Management", "score": 25}, {"name": "Team Leadership", "score": 30}]
}"#;

pub const EDUCATION_PROMPT: &str = r#"Analyze this education section.

EDUCATION:
{content}

OUTPUT SCHEMA:
{
  "skills": [{"name": "Business Administration", "score": 5}],
  "education": [{"institution": "...", "degree": "...", "field": "...", "start": "YYYY", "end": "YYYY"}]
}"#;

pub const LANGUAGES_PROMPT: &str = r#"You are a language skills analyzer. Extract spoken languages and levels.

LANGUAGES:
{content}

RULES:
- Use levels: "native", "fluent", "advanced", "intermediate", "basic"
- If no languages are found return "languages": []

OUTPUT SCHEMA:
{
  "languages": [{"language": "English", "level": "native"}, {"language": "Spanish", "level": "fluent"}]
}"#;

pub const SUMMARY_PROMPT: &str = r#"Analyze this resume summary / personal information block.

SUMMARY:
{content}

Return JSON with:
- skills: general skills, base score 10
- location: city and/or country from contact info or address, "" if absent
- experience: total work experience as stated, "" if absent
- ready_to_remote: true only if remote work is explicitly welcome
- ready_to_trip: true only if business travel is explicitly welcome

OUTPUT SCHEMA:
{
  "skills": [{"name": "Team Leadership", "score": 10}],
  "location": "USA, New York",
  "experience": "5 years",
  "ready_to_remote": true,
  "ready_to_trip": false
}"#;

pub fn template_for(block_type: BlockType) -> &'static str {
    match block_type {
        BlockType::Projects => PROJECTS_PROMPT,
        BlockType::Skills => SKILLS_PROMPT,
        BlockType::Education => EDUCATION_PROMPT,
        BlockType::Languages => LANGUAGES_PROMPT,
        BlockType::Summary => SUMMARY_PROMPT,
    }
}
