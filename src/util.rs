//! Small utility helpers used across modules.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Compile a hardcoded pattern; an invalid one degrades to a regex that never matches.
pub fn compile_regex(pattern: &str) -> Regex {
  match Regex::new(pattern) {
    Ok(regex) => regex,
    Err(_compile_err) => match Regex::new(r"$^") {
      Ok(fallback) => fallback,
      Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
    },
  }
}

static THINK_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(?s)<think>.*?</think>\n?"));
static INDENTED_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(?:\n[ \t]{4,}.*)+"));

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Remove every `<think>…</think>` scratch-reasoning block (and the newline after it).
pub fn strip_think_blocks(text: &str) -> String {
  THINK_BLOCK_REGEX.replace_all(text, "").into_owned()
}

/// Post-process a model reply before it is shown to the student.
///
/// Think blocks are always removed. If the reply contains Java but no fenced
/// code, runs of indented lines are wrapped in a ```java fence.
pub fn format_reply(raw: &str) -> String {
  let cleaned = strip_think_blocks(raw);
  let cleaned = if cleaned.contains("public static") && !cleaned.contains("```") {
    INDENTED_RUN_REGEX
      .replace_all(&cleaned, |caps: &Captures| format!("\n```java{}\n```", &caps[0]))
      .into_owned()
  } else {
    cleaned
  };
  cleaned.trim().to_string()
}

/// First `max` characters of `s` (char-safe).
pub fn excerpt(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge prompts or model replies.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    format!("{}… ({} bytes total)", excerpt(s, max), s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_fills_all_occurrences() {
    assert_eq!(fill_template("{a}-{b}-{a}", &[("a", "1"), ("b", "2")]), "1-2-1");
    assert_eq!(fill_template("{missing}", &[]), "{missing}");
  }

  #[test]
  fn think_blocks_are_removed() {
    let raw = "<think>plan the\nanswer</think>\nHello!<think>again</think> What next?";
    assert_eq!(strip_think_blocks(raw), "Hello! What next?");
    assert_eq!(format_reply("  <think>x</think>\n Hi  "), "Hi");
  }

  #[test]
  fn indented_java_gets_fenced() {
    let raw = "Here you go:\n    public static int sum(int a, int b) {\n        return a + b;\n    }\nWhat does return do?";
    let out = format_reply(raw);
    assert!(out.contains("```java\n    public static int sum"));
    assert!(out.contains("    }\n```\nWhat does return do?"));
  }

  #[test]
  fn fenced_replies_are_left_alone() {
    let raw = "```java\n    public static void main() {}\n```";
    assert_eq!(format_reply(raw), raw);
  }

  #[test]
  fn truncation_is_char_safe() {
    assert_eq!(trunc_for_log("héllo", 10), "héllo");
    assert!(trunc_for_log("héllo wörld", 2).starts_with("hé…"));
    assert_eq!(excerpt("äöü", 2), "äö");
  }
}
