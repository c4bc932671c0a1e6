//! HTML partial expansion.
//!
//! ```text
//! @@include('components/header.html')
//! @@include("components/card.html", {"title": "Hello"})
//! <h2>@@title</h2>
//! ```
//!
//! Included paths resolve against `basepath` (relative to the project root).
//! Parameters passed to an include are visible inside it as `@@name`, layered
//! on top of the stage-wide context.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{Asset, Stage, StageContext, TransformError};

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct FileInclude {
    prefix: String,
    basepath: PathBuf,
    context: Map<String, Value>,
}

impl FileInclude {
    pub fn new(prefix: &str, basepath: impl AsRef<Path>, context: Map<String, Value>) -> Self {
        Self {
            prefix: prefix.to_string(),
            basepath: basepath.as_ref().to_path_buf(),
            context,
        }
    }

    fn directive(&self) -> String {
        format!("{}include(", self.prefix)
    }

    fn expand(
        &self,
        text: &str,
        base: &Path,
        context: &Map<String, Value>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, String> {
        let directive = self.directive();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(&directive) {
            out.push_str(&substitute(&rest[..start], &self.prefix, context));
            let after = &rest[start + directive.len()..];
            let (file, params, consumed) = parse_args(after)?;

            let path = base.join(&file);
            if stack.contains(&path) {
                let chain: Vec<String> =
                    stack.iter().chain([&path]).map(|p| p.display().to_string()).collect();
                return Err(format!("include cycle: {}", chain.join(" -> ")));
            }
            if stack.len() >= MAX_DEPTH {
                return Err(format!("includes nested deeper than {MAX_DEPTH}"));
            }

            let partial = std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot include `{file}`: {e}"))?;

            let mut scope = context.clone();
            scope.extend(params);
            stack.push(path);
            let expanded = self.expand(&partial, base, &scope, stack)?;
            stack.pop();

            out.push_str(&expanded);
            rest = &after[consumed..];
        }

        out.push_str(&substitute(rest, &self.prefix, context));
        Ok(out)
    }
}

impl Stage for FileInclude {
    fn name(&self) -> &str {
        "include"
    }

    fn run(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let base = ctx.root.join(&self.basepath);
        assets
            .into_iter()
            .map(|mut asset| {
                let mut stack = Vec::new();
                if let Some(source) = &asset.source {
                    stack.push(source.clone());
                }
                let html = self
                    .expand(asset.text(self.name())?, &base, &self.context, &mut stack)
                    .map_err(|e| {
                        TransformError::new(self.name(), format!("{}: {e}", asset.path.display()))
                    })?;
                asset.set_contents(html.into_bytes());
                Ok(asset)
            })
            .collect()
    }
}

/// Parse `'file'[, {json}])` and return the file, params and bytes consumed.
fn parse_args(input: &str) -> Result<(String, Map<String, Value>, usize), String> {
    let trimmed = input.trim_start();
    let mut pos = input.len() - trimmed.len();

    let quote = trimmed
        .chars()
        .next()
        .filter(|c| matches!(c, '\'' | '"'))
        .ok_or("include path must be quoted")?;
    let body = &trimmed[1..];
    let end = body.find(quote).ok_or("unterminated include path")?;
    let file = body[..end].to_string();
    pos += end + 2;

    let mut params = Map::new();
    let tail = &input[pos..];
    let tail_trimmed = tail.trim_start();
    pos += tail.len() - tail_trimmed.len();

    if let Some(json) = tail_trimmed.strip_prefix(',') {
        pos += 1;
        let mut stream = serde_json::Deserializer::from_str(json).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => params = map,
            Some(Ok(_)) => return Err("include parameters must be a JSON object".into()),
            Some(Err(e)) => return Err(format!("invalid include parameters: {e}")),
            None => return Err("missing include parameters".into()),
        }
        pos += stream.byte_offset();
    }

    let tail = &input[pos..];
    let tail_trimmed = tail.trim_start();
    pos += tail.len() - tail_trimmed.len();
    if !tail_trimmed.starts_with(')') {
        return Err(format!("expected `)` after include of `{file}`"));
    }
    Ok((file, params, pos + 1))
}

/// Replace `@@key` for every context key, longest keys first.
fn substitute(text: &str, prefix: &str, context: &Map<String, Value>) -> String {
    if context.is_empty() || !text.contains(prefix) {
        return text.to_string();
    }
    let mut keys: Vec<&String> = context.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut out = text.to_string();
    for key in keys {
        let value = match &context[key] {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        out = out.replace(&format!("{prefix}{key}"), &value);
    }
    out
}
