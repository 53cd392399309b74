//! Prompt templates
//!
//! Placeholder syntax:
//! - `{{{name}}}` substitutes the text variable `name` verbatim
//! - `{{media url=name}}` embeds the image referenced by `name`
//!
//! Substituted values are never re-scanned for placeholders.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{template}' references missing variable '{variable}'")]
    MissingVariable {
        template: &'static str,
        variable: String,
    },

    #[error("template '{template}' has an unterminated placeholder at byte {offset}")]
    Unterminated { template: &'static str, offset: usize },

    #[error("template '{template}' uses unknown directive '{directive}'")]
    UnknownDirective {
        template: &'static str,
        directive: String,
    },
}

/// One ordered segment of a rendered prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptPart {
    Text { text: String },
    Media { url: String },
}

/// A template with all placeholders resolved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedPrompt {
    pub parts: Vec<PromptPart>,
}

impl RenderedPrompt {
    /// Concatenated text parts, media omitted
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text { text } => Some(text.as_str()),
                PromptPart::Media { .. } => None,
            })
            .collect()
    }

    pub fn media(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            PromptPart::Media { url } => Some(url.as_str()),
            PromptPart::Text { .. } => None,
        })
    }

    fn push_text(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }
        if let Some(PromptPart::Text { text }) = self.parts.last_mut() {
            text.push_str(segment);
        } else {
            self.parts.push(PromptPart::Text {
                text: segment.to_string(),
            });
        }
    }
}

/// A named static prompt template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub source: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Render against `(name, value)` pairs
    ///
    /// A text placeholder without a value is an error. A media placeholder
    /// whose value is absent or blank is dropped.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<RenderedPrompt, TemplateError> {
        let lookup = |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| *v);

        let mut out = RenderedPrompt::default();
        let mut rest = self.source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_text(&rest[..start]);
            let tail = &rest[start..];

            let consumed = if let Some(body) = tail.strip_prefix("{{{") {
                let end = body.find("}}}").ok_or(TemplateError::Unterminated {
                    template: self.name,
                    offset: offset + start,
                })?;
                let name = body[..end].trim();
                let value = lookup(name).ok_or_else(|| TemplateError::MissingVariable {
                    template: self.name,
                    variable: name.to_string(),
                })?;
                out.push_text(value);
                3 + end + 3
            } else {
                let body = &tail[2..];
                let end = body.find("}}").ok_or(TemplateError::Unterminated {
                    template: self.name,
                    offset: offset + start,
                })?;
                let directive = body[..end].trim();
                let name = directive
                    .strip_prefix("media")
                    .map(str::trim_start)
                    .and_then(|args| args.strip_prefix("url="))
                    .map(str::trim)
                    .ok_or_else(|| TemplateError::UnknownDirective {
                        template: self.name,
                        directive: directive.to_string(),
                    })?;
                if let Some(url) = lookup(name).filter(|v| !v.trim().is_empty()) {
                    out.parts.push(PromptPart::Media {
                        url: url.to_string(),
                    });
                }
                2 + end + 2
            };

            offset += start + consumed;
            rest = &rest[start + consumed..];
        }
        out.push_text(rest);

        Ok(out)
    }

    /// Variable names referenced by the template, in order of appearance
    pub fn variables(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.source;
        while let Some(start) = rest.find("{{") {
            let tail = &rest[start..];
            let (name, consumed) = if let Some(body) = tail.strip_prefix("{{{") {
                match body.find("}}}") {
                    Some(end) => (Some(body[..end].trim()), 3 + end + 3),
                    None => break,
                }
            } else {
                let body = &tail[2..];
                match body.find("}}") {
                    Some(end) => (
                        body[..end].trim().rsplit('=').next().map(str::trim),
                        2 + end + 2,
                    ),
                    None => break,
                }
            };
            if let Some(name) = name {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            rest = &rest[start + consumed..];
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETING: PromptTemplate =
        PromptTemplate::new("greeting", "Hello {{{name}}}!\nAvatar: {{media url=avatar}}\nBye.");

    #[test]
    fn test_render_text_and_media() {
        let prompt = GREETING
            .render(&[("name", "Ada"), ("avatar", "data:image/png;base64,AAAA")])
            .unwrap();

        assert_eq!(
            prompt.parts,
            vec![
                PromptPart::Text {
                    text: "Hello Ada!\nAvatar: ".to_string()
                },
                PromptPart::Media {
                    url: "data:image/png;base64,AAAA".to_string()
                },
                PromptPart::Text {
                    text: "\nBye.".to_string()
                },
            ]
        );
        assert_eq!(prompt.media().count(), 1);
    }

    #[test]
    fn test_empty_media_is_dropped() {
        let prompt = GREETING.render(&[("name", "Ada"), ("avatar", "")]).unwrap();
        assert_eq!(prompt.parts.len(), 1);
        assert_eq!(prompt.text(), "Hello Ada!\nAvatar: \nBye.");

        let absent = GREETING.render(&[("name", "Ada")]).unwrap();
        assert_eq!(absent, prompt);
    }

    #[test]
    fn test_missing_text_variable() {
        let err = GREETING.render(&[]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingVariable {
                template: "greeting",
                variable: "name".to_string()
            }
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let prompt = GREETING
            .render(&[("name", "{{{avatar}}}"), ("avatar", "")])
            .unwrap();
        assert!(prompt.text().starts_with("Hello {{{avatar}}}!"));
    }

    #[test]
    fn test_malformed_templates() {
        let open = PromptTemplate::new("open", "Hi {{{name");
        assert!(matches!(
            open.render(&[("name", "x")]),
            Err(TemplateError::Unterminated { offset: 3, .. })
        ));

        let unknown = PromptTemplate::new("unknown", "{{#each items}}");
        assert!(matches!(
            unknown.render(&[]),
            Err(TemplateError::UnknownDirective { .. })
        ));
    }

    #[test]
    fn test_variables() {
        assert_eq!(GREETING.variables(), vec!["name", "avatar"]);
    }
}
