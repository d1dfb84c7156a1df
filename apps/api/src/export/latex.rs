//! LaTeX sources for the PDF exports. Every user-supplied string goes through
//! `escape_latex`.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::project::ProjectRow;
use crate::models::resource::ResourceRow;

/// One person's booking on the exported project.
#[derive(Debug, Clone)]
pub struct StaffingLine {
    pub resource_name: String,
    pub role: Option<String>,
    pub percent: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One project booking on the exported resource.
#[derive(Debug, Clone)]
pub struct BookingLine {
    pub project_name: String,
    pub percent: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Brackets are braced so text after a `\\` line break is never read as its
/// optional argument.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '<' => out.push_str(r"\textless{}"),
            '>' => out.push_str(r"\textgreater{}"),
            '[' => out.push_str("{[}"),
            ']' => out.push_str("{]}"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Escapes and keeps paragraph breaks; single newlines become line breaks.
fn escape_paragraphs(text: &str) -> String {
    text.trim()
        .split("\n\n")
        .map(|p| {
            p.lines()
                .map(escape_latex)
                .collect::<Vec<_>>()
                .join(r"\\ ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

const PREAMBLE: &str = r"\documentclass[11pt,a4paper]{article}
\usepackage[T1]{fontenc}
\usepackage[utf8]{inputenc}
\usepackage[margin=2cm]{geometry}
\usepackage{booktabs}
\usepackage{longtable}
\setlength{\parindent}{0pt}
\setlength{\parskip}{0.6em}
\pagestyle{plain}
";

fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "open".to_string());
    format!("{} to {}", fmt(start), fmt(end))
}

fn begin_document(out: &mut String, title: &str, subtitle: &str) {
    out.push_str(PREAMBLE);
    out.push_str("\\begin{document}\n");
    let _ = writeln!(out, "{{\\LARGE\\bfseries {}}}\\\\[0.3em]", escape_latex(title));
    let _ = writeln!(out, "{{\\large {}}}\n", escape_latex(subtitle));
    out.push_str("\\hrule\\vspace{1em}\n\n");
}

fn section(out: &mut String, heading: &str) {
    let _ = writeln!(out, "\\section*{{{}}}", escape_latex(heading));
}

pub fn render_project_report(
    project: &ProjectRow,
    client_name: Option<&str>,
    staffing: &[StaffingLine],
) -> String {
    let mut out = String::new();
    let subtitle = match client_name {
        Some(client) => format!("Project report for {client}"),
        None => "Project report".to_string(),
    };
    begin_document(&mut out, &project.name, &subtitle);

    let _ = writeln!(
        out,
        "\\textbf{{Status:}} {}\\\\\n\\textbf{{Dates:}} {}",
        escape_latex(&project.status.replace('_', " ")),
        escape_latex(&date_range(project.start_date, project.end_date)),
    );
    if let Some(budget) = project.budget {
        let _ = writeln!(out, "\\\\\n\\textbf{{Budget:}} {budget:.2}");
    }
    out.push('\n');

    if let Some(description) = project.description.as_deref().filter(|d| !d.trim().is_empty()) {
        section(&mut out, "Overview");
        out.push_str(&escape_paragraphs(description));
        out.push_str("\n\n");
    }

    section(&mut out, "Required skills");
    if project.required_skills.0.is_empty() {
        out.push_str("None listed.\n\n");
    } else {
        out.push_str("\\begin{longtable}{lll}\n\\toprule\nSkill & Minimum level & Importance \\\\\n\\midrule\n");
        for skill in &project.required_skills.0 {
            let _ = writeln!(
                out,
                "{} & {} & {} \\\\",
                escape_latex(&skill.name),
                skill.min_proficiency,
                escape_latex(&skill.importance.as_str().replace('_', " ")),
            );
        }
        out.push_str("\\bottomrule\n\\end{longtable}\n\n");
    }

    section(&mut out, "Staffing");
    if staffing.is_empty() {
        out.push_str("Nobody is allocated to this project yet.\n\n");
    } else {
        out.push_str(
            "\\begin{longtable}{llrl}\n\\toprule\nName & Role & Allocation & Dates \\\\\n\\midrule\n",
        );
        for line in staffing {
            let _ = writeln!(
                out,
                "{} & {} & {}\\% & {} \\\\",
                escape_latex(&line.resource_name),
                escape_latex(line.role.as_deref().unwrap_or("-")),
                line.percent,
                escape_latex(&date_range(Some(line.start_date), Some(line.end_date))),
            );
        }
        out.push_str("\\bottomrule\n\\end{longtable}\n\n");
    }

    out.push_str("\\end{document}\n");
    out
}

pub fn render_resource_profile(resource: &ResourceRow, bookings: &[BookingLine]) -> String {
    let mut out = String::new();
    let subtitle = format!(
        "{} ({})",
        resource.role_title,
        resource.seniority.replace('_', " ")
    );
    begin_document(&mut out, &resource.name, &subtitle);

    let _ = writeln!(
        out,
        "\\textbf{{Email:}} {}\\\\\n\\textbf{{Availability:}} {}\\%",
        escape_latex(&resource.email),
        resource.availability_percent,
    );
    if let Some(location) = resource.location.as_deref() {
        let _ = writeln!(out, "\\\\\n\\textbf{{Location:}} {}", escape_latex(location));
    }
    out.push('\n');

    if let Some(bio) = resource.bio.as_deref().filter(|b| !b.trim().is_empty()) {
        section(&mut out, "Profile");
        out.push_str(&escape_paragraphs(bio));
        out.push_str("\n\n");
    }

    section(&mut out, "Skills");
    if resource.skills.0.is_empty() {
        out.push_str("None recorded.\n\n");
    } else {
        out.push_str(
            "\\begin{longtable}{lllr}\n\\toprule\nSkill & Category & Level & Years \\\\\n\\midrule\n",
        );
        for skill in &resource.skills.0 {
            let years = skill
                .years_experience
                .map(|y| format!("{y:.1}"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{} & {} & {} & {} \\\\",
                escape_latex(&skill.name),
                escape_latex(skill.category.as_deref().unwrap_or("-")),
                skill.proficiency,
                years,
            );
        }
        out.push_str("\\bottomrule\n\\end{longtable}\n\n");
    }

    section(&mut out, "Allocations");
    if bookings.is_empty() {
        out.push_str("No allocations.\n\n");
    } else {
        out.push_str("\\begin{longtable}{lrl}\n\\toprule\nProject & Allocation & Dates \\\\\n\\midrule\n");
        for line in bookings {
            let _ = writeln!(
                out,
                "{} & {}\\% & {} \\\\",
                escape_latex(&line.project_name),
                line.percent,
                escape_latex(&date_range(Some(line.start_date), Some(line.end_date))),
            );
        }
        out.push_str("\\bottomrule\n\\end{longtable}\n\n");
    }

    out.push_str("\\end{document}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    use crate::models::project::{Importance, RequiredSkill};
    use crate::models::skill::Proficiency;
    use crate::staffing::load::tests::{d, project};
    use crate::staffing::resources::tests::{resource, skill};

    #[test]
    fn test_escape_latex_special_characters() {
        assert_eq!(escape_latex("R&D 100% $5 #1"), r"R\&D 100\% \$5 \#1");
        assert_eq!(escape_latex(r"a\b"), r"a\textbackslash{}b");
        assert_eq!(escape_latex("x_{y}^~"), r"x\_\{y\}\textasciicircum{}\textasciitilde{}");
        assert_eq!(escape_latex("plain text"), "plain text");
        assert_eq!(escape_latex("[Remote]"), "{[}Remote{]}");
    }

    #[test]
    fn test_bracketed_text_after_line_break_stays_literal() {
        let mut p = project(None, None);
        p.description = Some("Hybrid team\n[Remote] preferred".to_string());
        let staffing = vec![
            StaffingLine {
                resource_name: "Ada".to_string(),
                role: None,
                percent: 50,
                start_date: d(2025, 1, 6),
                end_date: d(2025, 1, 31),
            },
            StaffingLine {
                resource_name: "[Contractor] Bo".to_string(),
                role: None,
                percent: 50,
                start_date: d(2025, 1, 6),
                end_date: d(2025, 1, 31),
            },
        ];

        let tex = render_project_report(&p, None, &staffing);
        assert!(tex.contains(r"Hybrid team\\ {[}Remote{]} preferred"));
        assert!(tex.contains("\n{[}Contractor{]} Bo & - & 50"));
        assert!(!tex.contains(r"\\ ["));
    }

    #[test]
    fn test_project_report_escapes_user_text() {
        let mut p = project(Some(d(2025, 1, 6)), None);
        p.name = "Q1 R&D".to_string();
        p.description = Some("Line one\nLine two\n\nSecond para with 50%".to_string());
        p.required_skills = Json(vec![RequiredSkill {
            name: "C#".to_string(),
            min_proficiency: Proficiency::Advanced,
            importance: Importance::NiceToHave,
        }]);
        let staffing = vec![StaffingLine {
            resource_name: "Ada_L".to_string(),
            role: Some("Lead".to_string()),
            percent: 60,
            start_date: d(2025, 1, 6),
            end_date: d(2025, 3, 28),
        }];

        let tex = render_project_report(&p, Some("Acme & Sons"), &staffing);
        assert!(tex.starts_with(r"\documentclass"));
        assert!(tex.contains(r"Q1 R\&D"));
        assert!(tex.contains(r"Project report for Acme \& Sons"));
        assert!(tex.contains(r"Line one\\ Line two"));
        assert!(tex.contains(r"Second para with 50\%"));
        assert!(tex.contains(r"C\# & advanced & nice to have \\"));
        assert!(tex.contains(r"Ada\_L & Lead & 60\% & 2025-01-06 to 2025-03-28 \\"));
        assert!(tex.contains("2025-01-06 to open"));
        assert!(tex.trim_end().ends_with(r"\end{document}"));
    }

    #[test]
    fn test_empty_sections_have_placeholders() {
        let tex = render_project_report(&project(None, None), None, &[]);
        assert!(tex.contains("None listed."));
        assert!(tex.contains("Nobody is allocated"));
        assert!(!tex.contains("Overview"));
    }

    #[test]
    fn test_resource_profile_lists_skills_and_bookings() {
        let mut r = resource("Bo", 80, vec![skill("Go", Proficiency::Expert)]);
        r.bio = Some("Likes {braces}".to_string());
        let bookings = vec![BookingLine {
            project_name: "Platform #2".to_string(),
            percent: 40,
            start_date: d(2025, 2, 1),
            end_date: d(2025, 2, 28),
        }];
        let tex = render_resource_profile(&r, &bookings);
        assert!(tex.contains(r"Consultant (senior)"));
        assert!(tex.contains(r"\textbf{Availability:} 80\%"));
        assert!(tex.contains(r"Likes \{braces\}"));
        assert!(tex.contains(r"Go & - & expert & - \\"));
        assert!(tex.contains(r"Platform \#2 & 40\% & 2025-02-01 to 2025-02-28 \\"));
    }
}
