//! Heuristic Java code checks.
//!
//! Nothing here parses Java. A regex finds the first thing shaped like a method
//! header and simple substring tests do the rest, so syntactically broken code
//! that contains the right pieces passes, and valid code written unusually can
//! fail (annotations before the signature, generics with nested commas such as
//! `Map<String, List<Integer>>` in parameters, lambdas in default positions).
//! Feedback is guidance for a tutor, not a verdict from a compiler.
//!
//! No function in this module errors: an unrecognizable submission is simply
//! reported as incorrect with a generic message.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{ExerciseSpec, Validation};
use crate::util::compile_regex;

/// Modifiers, a return-type run, a name, and a parenthesized parameter list.
static SIGNATURE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  compile_regex(r"(public|protected|private|static|\s)*\s*([\w<>\[\]\s,]+)\s+(\w+)\s*\(([^)]*)\)")
});
static CODE_KEYWORD_REGEX: LazyLock<Regex> =
  LazyLock::new(|| compile_regex(r"\b(public|private|protected|static|void|return)\b"));
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\s+"));

const CODE_PUNCTUATION: [char; 5] = ['{', '}', '(', ')', ';'];

const NO_SIGNATURE_MESSAGE: &str =
  "I couldn't find a method signature. Write the full header, e.g. `public int sum(int a, int b)`.";

/// Cheap gate: does the text contain anything Java-ish at all?
pub fn looks_like_code(text: &str) -> bool {
  text.contains(CODE_PUNCTUATION) || CODE_KEYWORD_REGEX.is_match(text)
}

fn normalize_whitespace(s: &str) -> String {
  WHITESPACE_REGEX.replace_all(s, " ").trim().to_string()
}

/// The pieces of the first method header found in a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundSignature {
  pub return_type: String,
  pub name: String,
  /// Type part of each parameter (every token except the trailing name).
  pub param_types: Vec<String>,
}

pub fn extract_signature(code: &str) -> Option<FoundSignature> {
  let code = normalize_whitespace(code);
  let caps = SIGNATURE_REGEX.captures(&code)?;

  let return_type = caps.get(2).map(|m| normalize_whitespace(m.as_str())).unwrap_or_default();
  let name = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
  let params = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

  let param_types = params
    .split(',')
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .filter_map(|p| {
      let tokens: Vec<&str> = p.split_whitespace().collect();
      if tokens.len() < 2 {
        None
      } else {
        Some(tokens[..tokens.len() - 1].join(" "))
      }
    })
    .collect();

  Some(FoundSignature { return_type, name, param_types })
}

/// First signature problem, if any. `None` means every configured check passed.
fn signature_mismatch(code: &str, spec: &ExerciseSpec) -> Option<String> {
  let found = match extract_signature(code) {
    Some(f) => f,
    None => return Some(NO_SIGNATURE_MESSAGE.to_string()),
  };

  if let Some(name) = &spec.method_name {
    if &found.name != name {
      return Some(format!("The method should be called `{}`, but I found `{}`.", name, found.name));
    }
  }
  if let Some(ret) = &spec.return_type {
    if !found.return_type.contains(ret.as_str()) {
      return Some(format!("Check the return type: it should be `{}`.", ret));
    }
  }
  for expected in &spec.param_types {
    if !found.param_types.iter().any(|t| t.contains(expected.as_str())) {
      return Some(format!("The parameter list needs a parameter of type `{}`.", expected));
    }
  }
  None
}

pub fn check_signature(code: &str, spec: &ExerciseSpec) -> bool {
  signature_mismatch(code, spec).is_none()
}

fn content_mismatch(code: &str, required: &[String], forbidden: &[String]) -> Option<String> {
  let lower = code.to_lowercase();
  if let Some(missing) = required.iter().find(|t| !lower.contains(&t.to_lowercase())) {
    return Some(format!("Your solution should use `{}`.", missing));
  }
  if let Some(present) = forbidden.iter().find(|t| lower.contains(&t.to_lowercase())) {
    return Some(format!("Try solving it without `{}`.", present));
  }
  None
}

/// Case-insensitive: all `required` present, no `forbidden` present.
pub fn check_content(code: &str, required: &[String], forbidden: &[String]) -> bool {
  content_mismatch(code, required, forbidden).is_none()
}

/// Signature check (when configured) then content check (when configured).
pub fn validate(code: &str, spec: &ExerciseSpec) -> Validation {
  if spec.has_signature_checks() {
    if let Some(msg) = signature_mismatch(code, spec) {
      return Validation::fail(msg);
    }
  }
  if spec.has_content_checks() {
    if let Some(msg) = content_mismatch(code, &spec.required_tokens, &spec.forbidden_tokens) {
      return Validation::fail(msg);
    }
  }
  Validation::pass()
}
