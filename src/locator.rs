use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::scan::balanced_end;

static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("valid selector"));
static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});

static NUXT_CLOSURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"window\.__NUXT__\s*=\s*(\(\s*function\s*\()").expect("valid regex")
});
static NUXT_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.__NUXT__\s*=\s*(\{)").expect("valid regex"));
static INITIAL_STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"window\.__INITIAL_STATE__\s*=\s*(\{)").expect("valid regex")
});
static INITIAL_DATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+initialData\s*=\s*(\{)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerPattern {
    /// `window.__NUXT__=(function(a,b,..){..})(..)`; values are aliased.
    NuxtClosure,
    NuxtObject,
    InitialState,
    /// `var initialData = {..}`
    InitialData,
    /// Any script mentioning `__NUXT__`; taken whole.
    BareNuxtName,
}

impl MarkerPattern {
    pub const PRIORITY: [MarkerPattern; 5] = [
        MarkerPattern::NuxtClosure,
        MarkerPattern::NuxtObject,
        MarkerPattern::InitialState,
        MarkerPattern::InitialData,
        MarkerPattern::BareNuxtName,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MarkerPattern::NuxtClosure => "nuxt_closure",
            MarkerPattern::NuxtObject => "nuxt_object",
            MarkerPattern::InitialState => "initial_state",
            MarkerPattern::InitialData => "initial_data",
            MarkerPattern::BareNuxtName => "bare_nuxt_name",
        }
    }

    pub fn needs_aliases(self) -> bool {
        matches!(self, MarkerPattern::NuxtClosure | MarkerPattern::BareNuxtName)
    }

    fn find(self, script: &str) -> Option<Range<usize>> {
        let re = match self {
            MarkerPattern::NuxtClosure => &*NUXT_CLOSURE_RE,
            MarkerPattern::NuxtObject => &*NUXT_OBJECT_RE,
            MarkerPattern::InitialState => &*INITIAL_STATE_RE,
            MarkerPattern::InitialData => &*INITIAL_DATA_RE,
            MarkerPattern::BareNuxtName => {
                return script.contains("__NUXT__").then(|| 0..script.len());
            }
        };
        let start = re.captures(script)?.get(1)?.start();
        let end = match self {
            // The invocation tail sits past the balanced closure in the
            // `(function(){..})(..)` form, so keep the rest of the script.
            MarkerPattern::NuxtClosure => script.trim_end().trim_end_matches(';').len(),
            _ => balanced_end(script, start, '{', '}')
                .unwrap_or_else(|| script.trim_end().len()),
        };
        (end > start).then_some(start..end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedStateBlob<'a> {
    pub script_index: usize,
    /// Byte range inside the script's text.
    pub range: Range<usize>,
    pub pattern: MarkerPattern,
    pub text: &'a str,
}

pub fn inline_scripts(doc: &Html) -> Vec<String> {
    doc.select(&SCRIPT_SELECTOR)
        .filter(|el| el.value().attr("src").is_none())
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

pub fn json_ld_scripts(doc: &Html) -> Vec<String> {
    doc.select(&JSON_LD_SELECTOR)
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// First script, in document order, that any pattern matches; within a
/// script the patterns are tried in [`MarkerPattern::PRIORITY`] order.
pub fn locate_state(scripts: &[String]) -> Option<EmbeddedStateBlob<'_>> {
    scripts.iter().enumerate().find_map(|(script_index, script)| {
        MarkerPattern::PRIORITY.iter().find_map(|&pattern| {
            let range = pattern.find(script)?;
            Some(EmbeddedStateBlob {
                script_index,
                text: &script[range.clone()],
                range,
                pattern,
            })
        })
    })
}
