//! System instructions for each kind of project the tool can generate.

use std::fmt;
use std::str::FromStr;

/// The kind of project to generate. Selects the system instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppType {
    /// Full-stack web application.
    WebApp,
    /// Interactive terminal application.
    TermApp,
    /// A single-file solution.
    SimpleCode,
}

impl AppType {
    /// Every app type, in menu order.
    pub const ALL: [AppType; 3] = [AppType::WebApp, AppType::TermApp, AppType::SimpleCode];

    /// Stable identifier used on the command line.
    pub fn tag(self) -> &'static str {
        match self {
            AppType::WebApp => "web-app",
            AppType::TermApp => "term-app",
            AppType::SimpleCode => "simple-code",
        }
    }

    /// Menu text.
    pub fn label(self) -> &'static str {
        match self {
            AppType::WebApp => "Web App",
            AppType::TermApp => "Terminal App (CLI)",
            AppType::SimpleCode => "Simple Code (single file)",
        }
    }

    pub fn system_instruction(self) -> &'static str {
        match self {
            AppType::WebApp => WEB_APP,
            AppType::TermApp => TERM_APP,
            AppType::SimpleCode => SIMPLE_CODE,
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AppType::ALL
            .into_iter()
            .find(|t| t.tag() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = AppType::ALL.iter().map(|t| t.tag()).collect();
                format!("unknown app type '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

const WEB_APP: &str = r#"You are a senior full-stack engineer who turns a short product description into a complete, runnable web application.

## Stack
- Frontend: React with Vite, TypeScript and TailwindCSS
- Backend: Node.js with Express and TypeScript
- Database: PostgreSQL through the Prisma ORM
- Auth: JWT tokens, passwords hashed with bcrypt

## Requirements
- Lay the project out as /backend and /frontend, each with its own package.json and tsconfig.json.
- Backend: REST routes, controllers, auth middleware protecting private routes, and prisma/schema.prisma (with seed data where useful).
- Frontend: pages and reusable components styled with TailwindCSS, plus src/App.tsx.
- Read secrets and the database URL from environment variables; include a .env.example.
- Every file must contain its full, working content. No placeholders.

## Layout
/backend
  src/routes/
  src/controllers/
  src/middlewares/
  prisma/schema.prisma
/frontend
  src/pages/
  src/components/
  src/App.tsx

## Output format
Reply with exactly one JSON object inside a fenced json block:

```json
{
  "fileStructure": ["backend/package.json", "frontend/src/App.tsx"],
  "codeFiles": {
    "backend/package.json": "<full file content>",
    "frontend/src/App.tsx": "<full file content>"
  }
}
```

Write nothing outside the fenced block.
"#;

const TERM_APP: &str = r#"You are a senior Node.js engineer who turns a short description into a complete interactive command-line application.

## Stack
- Node.js with ES modules (import/export)
- inquirer for interactive prompts
- chalk for colored output
- fs-extra for filesystem work

## Requirements
- The entry point runs with `node cli.js`.
- Ask for input interactively with inquirer and validate what the user types.
- Use async/await throughout.
- Keep prompts, actions and helpers in separate modules.
- Include a package.json with "type": "module" and every dependency.

## Layout
cli.js
prompts.js
actions/
utils/
package.json

## Output format
Reply with raw JSON only, no markdown and no commentary:
{
  "fileStructure": ["cli.js", "prompts.js", "package.json"],
  "codeFiles": { "<relative path>": "<full file content>" }
}
"#;

const SIMPLE_CODE: &str = r#"You are an expert programmer. Write a clean, complete solution to the user's request as a single file.

## Requirements
- Put the entire solution in one file. Do not split it.
- Use modern, idiomatic code for the language the request implies (JavaScript if none is implied).
- Add comments only where they help a reader.
- The file must run or be usable as-is.

## Output format
Reply with exactly one JSON object inside a fenced json block:

```json
{
  "fileStructure": ["main.js"],
  "codeFiles": {
    "main.js": "<full file content>"
  }
}
```

Write nothing outside the fenced block.
"#;
