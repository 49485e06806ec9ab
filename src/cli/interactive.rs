//! Terminal prompts: app-type menu, project name, description entry, preview.
//!
//! Prompt functions take any `BufRead`/`Write` pair so they can be driven
//! from tests.

use std::io::{BufRead, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use llm_scaffold::AppType;

pub const DEFAULT_PROJECT_NAME: &str = "my-app";

/// Read one line; `None` at end of input.
fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).context("failed to read from stdin")? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Numbered app-type menu. Enter picks the first entry.
pub fn select_app_type(input: &mut impl BufRead, out: &mut impl Write) -> Result<AppType> {
    writeln!(out, "{}", "Which type of app do you want to generate?".bold())?;
    for (i, app) in AppType::ALL.iter().enumerate() {
        writeln!(out, "  {}. {} ({})", i + 1, app.label(), app.tag().dimmed())?;
    }
    loop {
        write!(out, "Select [1-{}] (1): ", AppType::ALL.len())?;
        out.flush()?;
        let Some(answer) = read_line(input)? else {
            bail!("no app type selected");
        };
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(AppType::ALL[0]);
        }
        if let Ok(n) = answer.parse::<usize>() {
            if (1..=AppType::ALL.len()).contains(&n) {
                return Ok(AppType::ALL[n - 1]);
            }
        }
        if let Ok(app) = answer.parse::<AppType>() {
            return Ok(app);
        }
        writeln!(out, "{}", format!("'{}' is not one of the options.", answer).red())?;
    }
}

/// A project name must be a single, plain directory name.
pub fn check_project_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        bail!("project name must not be empty, '.' or '..'");
    }
    if name.contains(['/', '\\']) {
        bail!("project name must not contain path separators");
    }
    Ok(())
}

/// Ask for the project folder name, re-asking until it is valid.
pub fn ask_project_name(input: &mut impl BufRead, out: &mut impl Write) -> Result<String> {
    loop {
        write!(
            out,
            "{} ({}): ",
            "Enter a name for your project folder".bold(),
            DEFAULT_PROJECT_NAME
        )?;
        out.flush()?;
        let answer = read_line(input)?.unwrap_or_default();
        let name = match answer.trim() {
            "" => DEFAULT_PROJECT_NAME.to_string(),
            other => other.to_string(),
        };
        match check_project_name(&name) {
            Ok(()) => return Ok(name),
            Err(e) => writeln!(out, "{}", e.to_string().red())?,
        }
    }
}

/// Read a multi-line description from `input`, ending at a line holding a
/// single `.` or at end of input.
pub fn read_description(input: &mut impl BufRead, out: &mut impl Write) -> Result<String> {
    writeln!(
        out,
        "{}",
        "Describe your app idea. Finish with a line containing only '.':".bold()
    )?;
    out.flush()?;
    let mut lines = Vec::new();
    while let Some(line) = read_line(input)? {
        if line.trim() == "." {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n").trim().to_string())
}

/// The editor command from `$VISUAL`, then `$EDITOR`, then a platform default.
fn editor_command() -> String {
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| {
            if cfg!(windows) {
                "notepad".to_string()
            } else {
                "vi".to_string()
            }
        })
}

/// Open the user's editor on a temp file seeded with `initial` and return
/// what they saved, trimmed.
pub fn edit_description(initial: &str) -> Result<String> {
    let file = tempfile::Builder::new()
        .prefix("llm-scaffold-")
        .suffix(".md")
        .tempfile()
        .context("failed to create a temp file for the editor")?;
    fs_err::write(file.path(), initial)?;

    let editor = editor_command();
    // The variable may carry arguments, e.g. "code --wait".
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .with_context(|| format!("failed to launch editor '{}'", editor))?;
    if !status.success() {
        bail!("editor '{}' exited with {}", editor, status);
    }

    Ok(fs_err::read_to_string(file.path())?.trim().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewChoice {
    Proceed,
    EditAgain,
    Cancel,
}

/// Show the description and ask whether to proceed.
pub fn preview(
    description: &str,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<PreviewChoice> {
    writeln!(out, "\n{}\n", "Here's what you wrote:".cyan())?;
    writeln!(out, "{}\n", description.dimmed())?;
    loop {
        write!(
            out,
            "{} [Y]es, generate / [e]dit again / [c]ancel: ",
            "Proceed with this input?".bold()
        )?;
        out.flush()?;
        let Some(answer) = read_line(input)? else {
            return Ok(PreviewChoice::Cancel);
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "" | "y" | "yes" => return Ok(PreviewChoice::Proceed),
            "e" | "edit" => return Ok(PreviewChoice::EditAgain),
            "c" | "cancel" | "n" | "no" => return Ok(PreviewChoice::Cancel),
            other => writeln!(out, "{}", format!("Unrecognized answer '{}'.", other).red())?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run<T>(
        answers: &str,
        f: impl FnOnce(&mut Cursor<Vec<u8>>, &mut Vec<u8>) -> Result<T>,
    ) -> (Result<T>, String) {
        colored::control::set_override(false);
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut out = Vec::new();
        let result = f(&mut input, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn menu_accepts_number_tag_or_default() {
        let (app, out) = run("2\n", |i, o| select_app_type(i, o));
        assert_eq!(app.unwrap(), AppType::TermApp);
        assert!(out.contains("1. Web App"));

        let (app, _) = run("\n", |i, o| select_app_type(i, o));
        assert_eq!(app.unwrap(), AppType::WebApp);

        let (app, out) = run("9\nsimple-code\n", |i, o| select_app_type(i, o));
        assert_eq!(app.unwrap(), AppType::SimpleCode);
        assert!(out.contains("'9' is not one of the options."));
    }

    #[test]
    fn menu_eof_is_an_error() {
        let (app, _) = run("", |i, o| select_app_type(i, o));
        assert!(app.is_err());
    }

    #[test]
    fn project_name_defaults_and_rejects_paths() {
        let (name, _) = run("\n", |i, o| ask_project_name(i, o));
        assert_eq!(name.unwrap(), DEFAULT_PROJECT_NAME);

        let (name, out) = run("../evil\nshop\n", |i, o| ask_project_name(i, o));
        assert_eq!(name.unwrap(), "shop");
        assert!(out.contains("path separators"));

        assert!(check_project_name("..").is_err());
        assert!(check_project_name("todo-app").is_ok());
    }

    #[test]
    fn description_ends_at_dot_line() {
        let (text, _) = run(
            "A todo app\nwith tags\n.\nignored\n",
            |i, o| read_description(i, o),
        );
        assert_eq!(text.unwrap(), "A todo app\nwith tags");

        let (text, _) = run("until eof\n", |i, o| read_description(i, o));
        assert_eq!(text.unwrap(), "until eof");
    }

    #[test]
    fn preview_choices() {
        let (choice, out) = run("\n", |i, o| preview("my idea", i, o));
        assert_eq!(choice.unwrap(), PreviewChoice::Proceed);
        assert!(out.contains("my idea"));

        let (choice, _) = run("maybe\ne\n", |i, o| preview("x", i, o));
        assert_eq!(choice.unwrap(), PreviewChoice::EditAgain);

        let (choice, _) = run("c\n", |i, o| preview("x", i, o));
        assert_eq!(choice.unwrap(), PreviewChoice::Cancel);

        let (choice, _) = run("", |i, o| preview("x", i, o));
        assert_eq!(choice.unwrap(), PreviewChoice::Cancel);
    }
}
