//! Static abbreviation table and plugin registries
//!
//! Pure data: short property codes, recognised pseudo-classes and
//! pseudo-elements, and the design-system plugin states and containers.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Reserved abbreviation that expands a theme typography preset.
pub const TYPOGRAPHY_ABBR: &str = "ty";

static ABBREVIATIONS: &[(&str, &[&str])] = &[
    // Color and background
    ("bg", &["background-color"]),
    ("bgi", &["background-image"]),
    ("bgs", &["background-size"]),
    ("bgp", &["background-position"]),
    ("bgr", &["background-repeat"]),
    ("bga", &["background-attachment"]),
    ("bgc", &["background-clip"]),
    ("c", &["color"]),
    ("op", &["opacity"]),
    // Spacing
    ("p", &["padding"]),
    ("pt", &["padding-top"]),
    ("pr", &["padding-right"]),
    ("pb", &["padding-bottom"]),
    ("pl", &["padding-left"]),
    ("px", &["padding-left", "padding-right"]),
    ("py", &["padding-top", "padding-bottom"]),
    ("m", &["margin"]),
    ("mt", &["margin-top"]),
    ("mr", &["margin-right"]),
    ("mb", &["margin-bottom"]),
    ("ml", &["margin-left"]),
    ("mx", &["margin-left", "margin-right"]),
    ("my", &["margin-top", "margin-bottom"]),
    // Sizing
    ("w", &["width"]),
    ("h", &["height"]),
    ("minw", &["min-width"]),
    ("maxw", &["max-width"]),
    ("minh", &["min-height"]),
    ("maxh", &["max-height"]),
    ("size", &["width", "height"]),
    ("ar", &["aspect-ratio"]),
    ("bs", &["box-sizing"]),
    // Layout
    ("d", &["display"]),
    ("pos", &["position"]),
    ("inset", &["inset"]),
    ("t", &["top"]),
    ("r", &["right"]),
    ("b", &["bottom"]),
    ("l", &["left"]),
    ("z", &["z-index"]),
    ("of", &["overflow"]),
    ("ofx", &["overflow-x"]),
    ("ofy", &["overflow-y"]),
    ("v", &["visibility"]),
    ("ct", &["content"]),
    ("ctt", &["container-type"]),
    ("ctn", &["container-name"]),
    // Flex and grid
    ("fx", &["flex"]),
    ("fxd", &["flex-direction"]),
    ("fxw", &["flex-wrap"]),
    ("fxg", &["flex-grow"]),
    ("fxs", &["flex-shrink"]),
    ("fxb", &["flex-basis"]),
    ("jc", &["justify-content"]),
    ("ji", &["justify-items"]),
    ("js", &["justify-self"]),
    ("ai", &["align-items"]),
    ("ac", &["align-content"]),
    ("as", &["align-self"]),
    ("pc", &["place-content"]),
    ("pi", &["place-items"]),
    ("gap", &["gap"]),
    ("rg", &["row-gap"]),
    ("cg", &["column-gap"]),
    ("gtc", &["grid-template-columns"]),
    ("gtr", &["grid-template-rows"]),
    ("gta", &["grid-template-areas"]),
    ("ga", &["grid-area"]),
    ("gc", &["grid-column"]),
    ("gr", &["grid-row"]),
    ("gaf", &["grid-auto-flow"]),
    ("ord", &["order"]),
    // Border and outline
    ("bd", &["border"]),
    ("bdt", &["border-top"]),
    ("bdr", &["border-right"]),
    ("bdb", &["border-bottom"]),
    ("bdl", &["border-left"]),
    ("bdc", &["border-color"]),
    ("bdw", &["border-width"]),
    ("bds", &["border-style"]),
    ("br", &["border-radius"]),
    ("ol", &["outline"]),
    ("olo", &["outline-offset"]),
    // Typography
    ("fs", &["font-size"]),
    ("fw", &["font-weight"]),
    ("ff", &["font-family"]),
    ("fst", &["font-style"]),
    ("lh", &["line-height"]),
    ("ls", &["letter-spacing"]),
    ("ta", &["text-align"]),
    ("td", &["text-decoration"]),
    ("tt", &["text-transform"]),
    ("to", &["text-overflow"]),
    ("ts", &["text-shadow"]),
    ("ws", &["white-space"]),
    ("wb", &["word-break"]),
    ("ow", &["overflow-wrap"]),
    ("va", &["vertical-align"]),
    // Effects
    ("bxs", &["box-shadow"]),
    ("fil", &["filter"]),
    ("bf", &["backdrop-filter"]),
    ("tf", &["transform"]),
    ("tfo", &["transform-origin"]),
    ("tr", &["transition"]),
    ("an", &["animation"]),
    ("anm", &["animation-name"]),
    ("and", &["animation-duration"]),
    ("mbm", &["mix-blend-mode"]),
    // Interaction
    ("cur", &["cursor"]),
    ("pe", &["pointer-events"]),
    ("us", &["user-select"]),
    ("rs", &["resize"]),
    ("sb", &["scroll-behavior"]),
    ("ofit", &["object-fit"]),
    ("opos", &["object-position"]),
    ("lst", &["list-style"]),
    ("tl", &["table-layout"]),
];

/// Pseudo-class name -> selector suffix.
static PSEUDO_CLASSES: &[(&str, &str)] = &[
    ("hover", ":hover"),
    ("focus", ":focus"),
    ("active", ":active"),
    ("visited", ":visited"),
    ("focus-within", ":focus-within"),
    ("focus-visible", ":focus-visible"),
    ("disabled", ":disabled"),
    ("enabled", ":enabled"),
    ("checked", ":checked"),
    ("indeterminate", ":indeterminate"),
    ("required", ":required"),
    ("optional", ":optional"),
    ("valid", ":valid"),
    ("invalid", ":invalid"),
    ("read-only", ":read-only"),
    ("placeholder-shown", ":placeholder-shown"),
    ("target", ":target"),
    ("empty", ":empty"),
    ("first-child", ":first-child"),
    ("last-child", ":last-child"),
    ("only-child", ":only-child"),
    ("first-of-type", ":first-of-type"),
    ("last-of-type", ":last-of-type"),
    ("odd", ":nth-child(odd)"),
    ("even", ":nth-child(even)"),
];

static PSEUDO_ELEMENTS: &[&str] = &[
    "before",
    "after",
    "placeholder",
    "selection",
    "marker",
    "first-letter",
    "first-line",
    "backdrop",
    "file-selector-button",
];

/// `<plugin>-<state>` -> concrete attribute selector.
static PLUGIN_STATES: &[(&str, &str)] = &[
    ("option-selected", "[aria-selected=\"true\"]"),
    ("option-disabled", "[aria-disabled=\"true\"]"),
    ("option-highlighted", "[data-highlighted]"),
    ("accordion-open", "[data-state=\"open\"]"),
    ("accordion-closed", "[data-state=\"closed\"]"),
    ("dialog-open", "[open]"),
    ("tab-selected", "[aria-selected=\"true\"]"),
    ("tab-disabled", "[aria-disabled=\"true\"]"),
    ("switch-checked", "[data-state=\"checked\"]"),
    ("switch-unchecked", "[data-state=\"unchecked\"]"),
    ("tooltip-visible", "[data-state=\"visible\"]"),
    ("menu-expanded", "[aria-expanded=\"true\"]"),
    ("field-invalid", "[aria-invalid=\"true\"]"),
];

/// `<plugin>-container` -> ancestor selector.
static PLUGIN_CONTAINERS: &[(&str, &str)] = &[
    ("accordion-container", "[data-plugin=\"accordion\"]"),
    ("dialog-container", "[role=\"dialog\"]"),
    ("menu-container", "[role=\"menu\"]"),
    ("tabs-container", "[role=\"tablist\"]"),
    ("listbox-container", "[role=\"listbox\"]"),
    ("tooltip-container", "[role=\"tooltip\"]"),
    ("form-container", "form"),
];

static ABBREVIATION_TABLE: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| ABBREVIATIONS.iter().copied().collect());

static PSEUDO_CLASS_TABLE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PSEUDO_CLASSES.iter().copied().collect());

static PLUGIN_STATE_TABLE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PLUGIN_STATES.iter().copied().collect());

static PLUGIN_CONTAINER_TABLE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PLUGIN_CONTAINERS.iter().copied().collect());

/// Real property names an abbreviation expands to.
pub fn lookup_abbreviation(abbr: &str) -> Option<&'static [&'static str]> {
    ABBREVIATION_TABLE.get(abbr).copied()
}

pub fn is_abbreviation(abbr: &str) -> bool {
    abbr == TYPOGRAPHY_ABBR || ABBREVIATION_TABLE.contains_key(abbr)
}

pub fn pseudo_class_selector(name: &str) -> Option<&'static str> {
    PSEUDO_CLASS_TABLE.get(name).copied()
}

pub fn is_pseudo_element(name: &str) -> bool {
    PSEUDO_ELEMENTS.iter().any(|element| *element == name)
}

pub fn plugin_state_selector(name: &str) -> Option<&'static str> {
    PLUGIN_STATE_TABLE.get(name).copied()
}

pub fn plugin_container_selector(name: &str) -> Option<&'static str> {
    PLUGIN_CONTAINER_TABLE.get(name).copied()
}

/// Every abbreviation in declaration order, for listings.
pub fn abbreviations() -> &'static [(&'static str, &'static [&'static str])] {
    ABBREVIATIONS
}
