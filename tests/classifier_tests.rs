use xss_hunter::analyze::context::{Classifier, ContextLabel, LineClassifier, Mode, QuotePosition};

fn run(body: &str, probe: &str) -> Vec<ContextLabel> {
    let c: &dyn Classifier = &LineClassifier;
    c.classify(body, probe)
}

#[test]
fn canonical_fixtures() {
    assert_eq!(run("asdf<br><dalfox>1234", "<dalfox>"), vec![ContextLabel::new(Mode::InHtml, QuotePosition::None)]);
    assert_eq!(run("<script><dalfox></script>", "<dalfox>"), vec![ContextLabel::new(Mode::InJs, QuotePosition::None)]);
    assert_eq!(
        run("<script>var a=\"<dalfox>\"</script>", "<dalfox>"),
        vec![ContextLabel::new(Mode::InJs, QuotePosition::Double)]
    );
    assert_eq!(run("<a href='dalfox'>zzz</a>", "dalfox"), vec![ContextLabel::new(Mode::InAttr, QuotePosition::Single)]);
}

#[test]
fn comment_and_textarea_positions_are_never_produced() {
    assert_eq!(run("<!-- dalfox -->", "dalfox"), vec![ContextLabel::new(Mode::InAttr, QuotePosition::None)]);
    assert_eq!(run("<textarea>dalfox</textarea>", "dalfox"), vec![ContextLabel::new(Mode::InHtml, QuotePosition::None)]);
}

#[test]
fn labels_render_for_logs() {
    let labels = run("<p>dalfox</p><script>'dalfox'</script>", "dalfox");
    let rendered: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
    assert_eq!(rendered, vec!["inHTML-none", "inJS-single"]);
}
