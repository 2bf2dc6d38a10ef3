use std::collections::BTreeMap;

use similar_asserts::assert_eq;

use nestplate::value::Value;
use nestplate::{context, Environment, ErrorKind};

fn render(source: &str, ctx: Value) -> String {
    Environment::new().render_str(source, ctx).unwrap()
}

fn yaml(source: &str) -> Value {
    serde_yaml::from_str(source).unwrap()
}

#[test]
fn test_passthrough() {
    for source in [
        "",
        "plain text",
        "trailing newline\n",
        "  indented\n\n\nblank lines\r\n",
        "a lone { brace } and }} closers %}",
        "unicode: äöü 🐍\n",
    ] {
        assert_eq!(render(source, context!(x => 1)), source);
        assert_eq!(render(source, Value::from(())), source);
    }
}

#[test]
fn test_person() {
    let ctx = yaml("person:\n  name: John\n  age: 30\n");
    assert_eq!(
        render("Name: {{ person.name }}\nAge: {{ person.age }}", ctx),
        "Name: John\nAge: 30"
    );
}

#[test]
fn test_skills_loop() {
    let ctx = yaml("employee:\n  skills: [Python, Java, SQL]\n");
    assert_eq!(
        render(
            "{% for skill in employee.skills %}\n- {{ skill }}\n{% endfor %}",
            ctx
        ),
        "\n- Python\n\n- Java\n\n- SQL\n"
    );
}

#[test]
fn test_missing_paths_render_empty() {
    let ctx = context!(person => context!(name => "John"), items => vec![1]);
    assert_eq!(render("[{{ missing }}]", ctx.clone()), "[]");
    assert_eq!(render("[{{ person.missing }}]", ctx.clone()), "[]");
    assert_eq!(render("[{{ person.name.first }}]", ctx.clone()), "[]");
    assert_eq!(render("[{{ items.0 }}]", ctx.clone()), "[]");
    assert_eq!(
        render("[{% for x in missing.path %}{{ x }}{% endfor %}]", ctx.clone()),
        "[]"
    );
    assert_eq!(
        render("[{% for x in person.name %}{{ x }}{% endfor %}]", ctx),
        "[]"
    );
}

#[test]
fn test_scalar_display() {
    let ctx = yaml("s: text\ni: -3\nf: 2.0\ng: 0.5\nt: true\nn: null\nl: [1, a, null]\nm: {a: 1}\n");
    assert_eq!(
        render(
            "{{ s }}|{{ i }}|{{ f }}|{{ g }}|{{ t }}|{{ n }}|{{ l }}|{{ m }}",
            ctx
        ),
        r#"text|-3|2.0|0.5|true||[1, "a", none]|{"a": 1}"#
    );
}

#[test]
fn test_loop_count_and_order() {
    for n in [0usize, 1, 2, 7] {
        let items: Vec<_> = (0..n).collect();
        let rv = render(
            "{% for x in items %}<{{ x }}>{% endfor %}",
            context!(items),
        );
        let expected: String = (0..n).map(|x| format!("<{x}>")).collect();
        assert_eq!(rv, expected);
    }
}

#[test]
fn test_mapping_loop_insertion_order() {
    let ctx = yaml("years:\n  '2023': current\n  '2021': old\n  '2022': previous\n");
    assert_eq!(
        render(
            "{% for year, label in years %}{{ year }}={{ label }}\n{% endfor %}",
            ctx.clone()
        ),
        "2023=current\n2021=old\n2022=previous\n"
    );
    assert_eq!(
        render("{% for year in years %}{{ year }} {% endfor %}", ctx.clone()),
        "2023 2021 2022 "
    );
    assert_eq!(render("{{ years.2021 }}", ctx), "old");
}

#[test]
fn test_nested_sections() {
    let ctx = yaml(
        "sections:\n\
         - title: Intro\n  subsections:\n    - title: Why\n    - title: How\n\
         - title: Empty\n  subsections: []\n",
    );
    let tmpl = "{% for section in sections %}# {{ section.title }}\n\
                {% for sub in section.subsections %}## {{ sub.title }}\n{% endfor %}\
                {% endfor %}";
    assert_eq!(render(tmpl, ctx), "# Intro\n## Why\n## How\n# Empty\n");
}

#[test]
fn test_shadowing() {
    let ctx = context!(x => "root", outer => vec!["a", "b"], inner => vec![1, 2]);
    assert_eq!(
        render(
            "{% for x in outer %}{{ x }}({% for x in inner %}{{ x }}{% endfor %}){{ x }};{% endfor %}{{ x }}",
            ctx
        ),
        "a(12)a;b(12)b;root"
    );
}

#[test]
fn test_truthiness() {
    let tmpl = "{% if value %}T{% else %}F{% endif %}";
    for (source, expected) in [
        ("value: 0", "F"),
        ("value: 0.0", "F"),
        ("value: ''", "F"),
        ("value: []", "F"),
        ("value: {}", "F"),
        ("value: null", "F"),
        ("value: false", "F"),
        ("other: 1", "F"),
        ("value: 1", "T"),
        ("value: -1", "T"),
        ("value: x", "T"),
        ("value: '0'", "T"),
        ("value: [0]", "T"),
        ("value: {a: null}", "T"),
        ("value: true", "T"),
    ] {
        assert_eq!(render(tmpl, yaml(source)), expected, "for {source}");
    }
}

#[test]
fn test_conditionals() {
    let tmpl = "{% if a %}A{% elif b %}B{% elif not c %}not C{% else %}none{% endif %}";
    assert_eq!(render(tmpl, context!(a => true)), "A");
    assert_eq!(render(tmpl, context!(b => true)), "B");
    assert_eq!(render(tmpl, context!(c => false)), "not C");
    assert_eq!(render(tmpl, context!(c => true)), "none");
    assert_eq!(render("{% if a %}A{% endif %}", context!()), "");
}

#[test]
fn test_loop_helper() {
    let ctx = context!(items => vec!["a", "b", "c"]);
    assert_eq!(
        render(
            "{% for x in items %}{{ loop.index }}/{{ loop.length }}:{{ x }}{% if not loop.last %}, {% endif %}{% endfor %}",
            ctx.clone()
        ),
        "1/3:a, 2/3:b, 3/3:c"
    );
    assert_eq!(
        render(
            "{% for x in items %}{% if loop.first %}[{% endif %}{{ loop.revindex0 }}{% endfor %}",
            ctx
        ),
        "[210"
    );
    assert_eq!(render("[{{ loop.index }}]", context!()), "[]");
}

#[test]
fn test_whitespace_is_preserved() {
    let ctx = context!(items => vec![1, 2]);
    assert_eq!(
        render("  {% for x in items %}  {{ x }}  {% endfor %}  \n", ctx),
        "    1    2    \n"
    );
}

#[test]
fn test_struct_context() {
    #[derive(serde::Serialize)]
    struct Report {
        title: &'static str,
        scores: BTreeMap<&'static str, f64>,
    }

    let mut scores = BTreeMap::new();
    scores.insert("accuracy", 0.93);
    scores.insert("recall", 1.0);
    let env = Environment::new();
    let rv = env
        .render_str(
            "{{ title }}:{% for name, score in scores %} {{ name }}={{ score }}{% endfor %}",
            Report {
                title: "Metrics",
                scores,
            },
        )
        .unwrap();
    assert_eq!(rv, "Metrics: accuracy=0.93 recall=1.0");
}

#[test]
fn test_syntax_errors() {
    let env = Environment::new();
    for (source, detail) in [
        (
            "{% for x in items %}\n- {{ x }}\n",
            "unexpected end of input, expected `endfor` to close `for` block from line 1",
        ),
        (
            "{% if x %}{% endfor %}",
            "unexpected `endfor`, expected `endif`",
        ),
        ("{% endif %}", "unexpected `endif` outside of a block"),
        ("{% while x %}", "unknown statement while"),
        ("{{ x | upper }}", "unexpected character"),
        ("{{ x", "unexpected end of input, expected `}}`"),
    ] {
        let err = env.template_from_str(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError, "for {source:?}");
        assert_eq!(err.detail(), Some(detail), "for {source:?}");
        assert_eq!(err.name(), Some("<string>"));
    }
}

#[test]
fn test_error_display() {
    let mut env = Environment::new();
    let err = env
        .add_template("report.md", "# Title\n{% for x in items %}\n{{ x }}\n{% endif %}\n")
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"syntax error: unexpected `endif`, expected `endfor` (in report.md:4)");
    insta::assert_snapshot!(err.display_debug_info().to_string(), @r###"
    ------------------------------- report.md --------------------------------
       1 | # Title
       2 | {% for x in items %}
       3 | {{ x }}
       4 > {% endif %}
    --------------------------------------------------------------------------
    "###);
}

#[test]
fn test_render_to_write() {
    let env = Environment::new();
    let tmpl = env.template_from_str("{{ a }}-{{ b }}\n").unwrap();
    let mut buf = Vec::new();
    tmpl.render_to_write(context!(a => 1, b => "two"), &mut buf)
        .unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "1-two\n");
}

#[test]
fn test_concurrent_renders() {
    let mut env = Environment::new();
    env.add_template("t", "{% for x in items %}{{ x }}{% endfor %}")
        .unwrap();
    let env = std::sync::Arc::new(env);
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let env = env.clone();
            std::thread::spawn(move || {
                let items: Vec<_> = (0..n).collect();
                env.get_template("t").unwrap().render(context!(items)).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|x| x.join().unwrap()).collect();
    assert_eq!(results, vec!["", "0", "01", "012"]);
}
