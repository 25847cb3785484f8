//! Seed data: built-in tutor personas and exercises.
//!
//! These guarantee the app is useful without any TOML config.

use crate::domain::{Exercise, ExerciseSpec, Persona};
use crate::retrieval::ReferenceNote;

fn persona(id: &str, name: &str, avatar: &str, role: &str, goal: &str, backstory: &str, reaction: &str) -> Persona {
  Persona {
    id: id.into(),
    name: name.into(),
    avatar: avatar.into(),
    role: role.into(),
    goal: goal.into(),
    backstory: backstory.into(),
    reaction: reaction.into(),
  }
}

pub fn seed_personas() -> Vec<Persona> {
  vec![
    persona(
      "batman", "Batman", "🦇",
      "A brooding detective who treats every bug as a vulnerability in Gotham's defenses.",
      "Train the student to write Java that holds up under pressure.",
      "Spends nights in the Batcave auditing code for weaknesses.",
      "Code received. Let's patch the vulnerability.",
    ),
    persona(
      "yoda", "Yoda", "🟢",
      "An ancient Jedi master who teaches through patient questions.",
      "Guide the student to discover Java's ways through their own reasoning.",
      "Has trained Padawans for centuries; now trains programmers.",
      "Code, you have pasted. Analyze it, we must.",
    ),
    persona(
      "spider-gwen", "Spider-Gwen", "🕷️",
      "A quick-witted hero who swings through syntax with style.",
      "Keep the student moving and confident while they learn Java.",
      "Balances band practice, patrols and pair programming.",
      "Let's swing through this syntax.",
    ),
    persona(
      "shuri", "Shuri", "🧪",
      "Wakanda's chief technologist, precise and playful.",
      "Show the student how elegant well-structured Java can be.",
      "Designs vibranium tech and teaches coding in her lab.",
      "Let's scan it with Wakandan tech.",
    ),
    persona(
      "elsa", "Elsa", "❄️",
      "A calm queen who brings order and clarity to messy code.",
      "Help the student refactor their thinking into clean Java.",
      "Learned control the hard way and teaches it gently.",
      "Let me freeze the bugs and refactor.",
    ),
    persona(
      "wednesday-addams", "Wednesday Addams", "🖤",
      "A deadpan critic with a morbid fascination for broken programs.",
      "Make the student dissect their code until it is flawless.",
      "Keeps a journal of the most gruesome stack traces.",
      "Let's dissect it like a corpse.",
    ),
    persona(
      "iron-man", "Iron Man", "🤖",
      "A genius engineer who treats every method like a suit upgrade.",
      "Upgrade the student's Java with fast, confident iterations.",
      "Built his first suit in a cave with a box of scraps.",
      "Let's run diagnostics and upgrade it.",
    ),
    persona(
      "nova", "Nova", "🌌",
      "A cosmic guide who explains logic as orbits and trajectories.",
      "Help the student see how the pieces of a Java program move together.",
      "Patrols the galaxy and maps the flow of control between stars.",
      "Let's orbit through its logic.",
    ),
    persona(
      "zee", "Zee", "🎮",
      "A gamer who frames every exercise as a level to beat.",
      "Keep the student motivated and treat mistakes as respawns.",
      "Speedruns coding challenges on stream.",
      "Let's treat this like a boss fight.",
    ),
    persona(
      "sherlock-holmes", "Sherlock Holmes", "🔍",
      "A consulting detective who deduces a program's intent from clues.",
      "Teach the student to reason about Java from evidence.",
      "Solves cases from Baker Street, now with a compiler.",
      "Let's deduce its structure.",
    ),
  ]
}

fn tokens(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

pub fn seed_exercises() -> Vec<Exercise> {
  vec![
    Exercise {
      id: "sum".into(),
      title: "Sum of two integers".into(),
      prompt: "Write a method `sum` that takes two `int` parameters and returns their sum.".into(),
      spec: ExerciseSpec {
        method_name: Some("sum".into()),
        return_type: Some("int".into()),
        param_types: tokens(&["int", "int"]),
        required_tokens: tokens(&["return", "+"]),
        forbidden_tokens: vec![],
      },
      reference_solution: Some("public int sum(int a, int b) {\n    return a + b;\n}".into()),
    },
    Exercise {
      id: "max".into(),
      title: "Maximum of two integers".into(),
      prompt: "Write a method `max` that takes two `int` values and returns the larger one, without using `Math.max`.".into(),
      spec: ExerciseSpec {
        method_name: Some("max".into()),
        return_type: Some("int".into()),
        param_types: tokens(&["int", "int"]),
        required_tokens: tokens(&["return"]),
        forbidden_tokens: tokens(&["Math.max"]),
      },
      reference_solution: Some("public int max(int a, int b) {\n    return a > b ? a : b;\n}".into()),
    },
    Exercise {
      id: "reverse".into(),
      title: "Reverse a String".into(),
      prompt: "Write a method `reverse` that takes a `String` and returns it reversed.".into(),
      spec: ExerciseSpec {
        method_name: Some("reverse".into()),
        return_type: Some("String".into()),
        param_types: tokens(&["String"]),
        required_tokens: tokens(&["return"]),
        forbidden_tokens: vec![],
      },
      reference_solution: Some(
        "public String reverse(String s) {\n    return new StringBuilder(s).reverse().toString();\n}".into(),
      ),
    },
    Exercise {
      id: "filter-evens".into(),
      title: "Filter even numbers".into(),
      prompt: "Write a method `filterEvens` that takes a `List<Integer>` and returns a new list with only the even numbers, using streams.".into(),
      spec: ExerciseSpec {
        method_name: Some("filterEvens".into()),
        return_type: Some("List<Integer>".into()),
        param_types: tokens(&["List<Integer>"]),
        required_tokens: tokens(&["stream", "filter", "collect"]),
        forbidden_tokens: vec![],
      },
      reference_solution: Some(
        "public List<Integer> filterEvens(List<Integer> nums) {\n    return nums.stream().filter(n -> n % 2 == 0).collect(Collectors.toList());\n}".into(),
      ),
    },
    Exercise {
      id: "double-numbers".into(),
      title: "Double every number".into(),
      prompt: "Write a method `doubleNumbers` that takes a `List<Integer>` and returns a list with every value doubled, using `stream()` and `map`.".into(),
      spec: ExerciseSpec {
        method_name: Some("doubleNumbers".into()),
        return_type: Some("List<Integer>".into()),
        param_types: tokens(&["List<Integer>"]),
        required_tokens: tokens(&["stream", "map"]),
        forbidden_tokens: vec![],
      },
      reference_solution: Some(
        "public List<Integer> doubleNumbers(List<Integer> nums) {\n    return nums.stream().map(n -> n * 2).collect(Collectors.toList());\n}".into(),
      ),
    },
  ]
}

fn note(title: &str, text: &str, tags: &[&str]) -> ReferenceNote {
  ReferenceNote { title: title.into(), text: text.into(), tags: tokens(tags) }
}

/// Short Java notes retrieved into prompts.
pub fn seed_reference_notes() -> Vec<ReferenceNote> {
  vec![
    note(
      "Method declarations",
      "A method header names the access modifier, the return type, the method name and a parenthesized parameter list: `public int sum(int a, int b)`. A `void` method returns nothing.",
      &["method", "signature", "parameter", "return", "void"],
    ),
    note(
      "The return statement",
      "`return expr;` ends the method and hands `expr` back to the caller. Its type must match the declared return type.",
      &["return", "type"],
    ),
    note(
      "Conditional (ternary) operator",
      "`cond ? a : b` evaluates to `a` when `cond` is true and to `b` otherwise. It is a compact alternative to an if/else that returns a value.",
      &["max", "larger", "ternary"],
    ),
    note(
      "StringBuilder",
      "`new StringBuilder(s).reverse().toString()` reverses a String. StringBuilder is mutable, String is not.",
      &["string", "reverse", "stringbuilder"],
    ),
    note(
      "Streams: filter",
      "`list.stream().filter(x -> cond)` keeps only elements for which the predicate holds. Finish with `.collect(Collectors.toList())` to get a List back.",
      &["stream", "filter", "even", "evens", "list"],
    ),
    note(
      "Streams: map",
      "`list.stream().map(x -> f(x))` transforms every element. Chain `.collect(Collectors.toList())` to build the resulting List.",
      &["stream", "map", "double", "list"],
    ),
    note(
      "Modulo operator",
      "`n % 2 == 0` is true for even numbers. `%` gives the remainder of integer division.",
      &["even", "evens", "modulo", "remainder"],
    ),
  ]
}
