//! JS and CSS minification.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. Parse failures surface
//! as [`TransformError`] so the run fails instead of shipping raw source.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::{Asset, Stage, StageContext, TransformError};

/// Minify JavaScript source code.
pub fn minify_js(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(ToString::to_string).collect();
        return Err(messages.join("; "));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Result<String, String> {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(result.code)
}

fn minify_each(
    stage: &str,
    assets: Vec<Asset>,
    minify: fn(&str) -> Result<String, String>,
) -> Result<Vec<Asset>, TransformError> {
    assets
        .into_iter()
        .map(|mut asset| {
            let code = minify(asset.text(stage)?).map_err(|e| {
                TransformError::new(stage, format!("{}: {e}", asset.path.display()))
            })?;
            asset.set_contents(code.into_bytes());
            Ok(asset)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct MinifyJs;

impl Stage for MinifyJs {
    fn name(&self) -> &str {
        "minify-js"
    }

    fn run(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        minify_each(self.name(), assets, minify_js)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MinifyCss;

impl Stage for MinifyCss {
    fn name(&self) -> &str {
        "minify-css"
    }

    fn run(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        minify_each(self.name(), assets, minify_css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::ctx;
    use std::path::Path;

    #[test]
    fn test_minify_js_shrinks() {
        let src = "function add(first, second) {\n  return first + second;\n}\nconsole.log(add(1, 2));\n";
        let out = minify_js(src).unwrap();
        assert!(out.len() < src.len());
        assert!(!out.contains("\n  "));
    }

    #[test]
    fn test_minify_css_shrinks() {
        let out = minify_css("body {\n  color: #ff0000;\n  margin: 0px;\n}\n").unwrap();
        assert!(out.starts_with("body{"));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_js_syntax_error_is_transform_error() {
        let root = Path::new("/r");
        let err = MinifyJs
            .run(vec![Asset::new("main.js", "function (")], &ctx(root, root))
            .unwrap_err();
        assert_eq!(err.stage, "minify-js");
        assert!(err.message.starts_with("main.js: "));
    }

    #[test]
    fn test_css_keeps_path() {
        let root = Path::new("/r");
        let out = MinifyCss
            .run(vec![Asset::new("css/a.css", "a { color: red; }")], &ctx(root, root))
            .unwrap();
        assert_eq!(out[0].path, Path::new("css/a.css"));
    }
}
