use std::sync::Arc;

use vwo_provider::{EvaluationContext, FeatureProvider, StaticClient, Value, VwoProvider};

pub fn main() {
    env_logger::init();

    let settings_path =
        std::env::var("VWO_SETTINGS_FILE").unwrap_or_else(|_| "tests/data/settings.json".to_owned());
    let client = StaticClient::from_file(&settings_path).unwrap();
    let provider = VwoProvider::new(Arc::new(client));

    // Without a "key" attribute, boolean resolution reports whether the flag is enabled.
    let enabled = provider.resolve_boolean_value("new-feature", false, None);
    println!("Enabled: {:?}", enabled);

    let context = EvaluationContext::default()
        .with_targeting_key("test-subject")
        .with_attribute("key", "var1");
    let greeting = provider.resolve_string_value("new-feature", "default".to_owned(), Some(&context));
    println!("Greeting: {:?}", greeting);

    // Without a "key" attribute, structured resolution collects all variables.
    let all = provider.resolve_structure_value("new-feature", Value::Null, None);
    println!("All variables: {:?}", all);

    // A "key" naming a json variable selects its object. A key with no json variable yields the
    // default value.
    let context = EvaluationContext::default().with_attribute("key", "theme");
    let theme = provider.resolve_structure_value("new-feature", Value::Null, Some(&context));
    println!("Theme: {:?}", theme);
}
