// All LLM prompt constants for the intelligence module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for resume skill extraction.
pub const EXTRACTION_SYSTEM: &str = "You are an experienced technical recruiter. \
    You read resumes and list the professional skills they demonstrate. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Extraction prompt template. Replace `{resume_text}` before sending.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract the skills demonstrated in the resume below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "skills": [
    {
      "name": "PostgreSQL",
      "category": "Databases",
      "proficiency": "advanced",
      "years_experience": 4,
      "evidence": "Led the migration of the billing database to PostgreSQL 15"
    }
  ],
  "summary": "Backend engineer with eight years in payments and data platforms.",
  "suggested_role_title": "Senior Backend Engineer",
  "total_years_experience": 8
}

Rules:
- proficiency is one of: "beginner", "intermediate", "advanced", "expert".
- Judge proficiency from responsibility and duration, not from adjectives the candidate uses.
- List each skill once, with its common name ("Kubernetes", not "k8s clusters").
- years_experience, category, evidence, suggested_role_title and total_years_experience may be null.
- evidence quotes or closely paraphrases the resume.

RESUME:
{resume_text}"#;

/// System prompt for tool-assisted candidate matching.
pub const MATCHING_SYSTEM: &str = "You are a staffing manager at a consultancy. \
    You choose the people best suited to a project from the company's resource pool. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Matching prompt template. Replace `{project}`, `{requirements}` and `{limit}`.
pub const MATCHING_PROMPT_TEMPLATE: &str = r#"Find the best candidates for this project.

PROJECT:
{project}

REQUIRED SKILLS (min_proficiency, importance):
{requirements}

Use `search_resources` to find people by skill and free capacity, and `get_resource`
to read a full profile. Return at most {limit} candidates, best first, as:
{
  "candidates": [
    {
      "resource_id": "uuid from a tool result",
      "score": 0-100,
      "rationale": "one or two sentences",
      "matched_skills": ["Rust"],
      "missing_skills": ["Terraform"]
    }
  ]
}"#;

/// System prompt for skill-gap recommendations.
pub const SKILL_GAP_SYSTEM: &str = "You are a resourcing lead at a consultancy. \
    You close skill gaps on project teams by training, reassigning, hiring or contracting. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Skill-gap prompt template. Replace `{project}`, `{team}` and `{gaps}`.
pub const SKILL_GAP_PROMPT_TEMPLATE: &str = r#"Recommend how to close the skill gaps on this project.

PROJECT:
{project}

CURRENT TEAM:
{team}

GAPS (skill, status, min_proficiency):
{gaps}

Use `search_resources` to look for people outside the team who could be reassigned, and
`get_resource` to check a profile. Return:
{
  "summary": "two or three sentences",
  "recommendations": [
    {
      "skill": "a skill from the GAPS list",
      "action": "train" | "hire" | "reassign" | "contract",
      "detail": "what to do and why",
      "resource_id": "uuid for train/reassign, otherwise null"
    }
  ]
}"#;
