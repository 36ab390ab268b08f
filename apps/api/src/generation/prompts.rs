//! Prompt assembly for test-case generation.
//!
//! The instruction language follows the dominant language of the input
//! (context + requirement). Detection failure defaults to French — the
//! product's primary audience.

use whatlang::Lang;

/// Default example block shown to the model for French-language requirements.
pub const FRENCH_DEFAULT_EXAMPLE: &str = r#"
**Cas fonctionnels**
Scenario (1) : Connexion OK avec des identifiants valides.
Précondition : L'utilisateur est inscrit avec un e-Mail valide et un MP.
Etapes :
    1. Accéder à la page de connexion.
    2. Saisir l'e-Mail et le MP valides.
    3. Cliquer sur "Se connecter".
Résultat attendu : L'utilisateur est redirigé vers la page d'accueil.

Scenario (2) : Erreur de connexion avec des identifiants invalides.
Précondition : L'utilisateur a un e-Mail valide mais un mot de passe invalide.
Etapes :
    1. Accéder à la page de connexion.
    2. Saisir un e-Mail valide et un MP invalide.
    3. Cliquer sur "Se connecter".
Résultat attendu : Un message d'erreur est affiché, l'utilisateur reste sur la page de connexion.
"#;

/// Default example block shown to the model for English-language requirements.
pub const ENGLISH_DEFAULT_EXAMPLE: &str = r#"
**Functional Test Cases**
Scenario (1): Successful login with valid credentials.
Precondition: User is registered with a valid email and password.
Steps:
    1. Access the login page.
    2. Enter valid email and password.
    3. Click on "Login".
Expected Result: User is redirected to the home page.

Scenario (2): Failed login with invalid credentials.
Precondition: User has a valid email but an incorrect password.
Steps:
    1. Access the login page.
    2. Enter valid email and invalid password.
    3. Click on "Login".
Expected Result: An error message is displayed, and the user remains on the login page.
"#;

/// Used for the gherkin format when the caller supplies no example of their own.
const GHERKIN_FALLBACK: &str = "Gherkin format";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestCaseFormat {
    #[default]
    Default,
    Gherkin,
    Custom,
}

impl From<&str> for TestCaseFormat {
    /// Unknown format selectors fall back to the default format.
    fn from(value: &str) -> Self {
        match value {
            "gherkin" => TestCaseFormat::Gherkin,
            "custom" => TestCaseFormat::Custom,
            _ => TestCaseFormat::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    French,
}

/// Picks the dominant language of the input. Anything that is not
/// confidently English — including detection failure — is treated as French.
pub fn detect_language(text: &str) -> Language {
    match whatlang::detect(text) {
        Some(info) if info.lang() == Lang::Eng => Language::English,
        _ => Language::French,
    }
}

/// Builds the single instruction string sent to the model.
///
/// Example selection: a non-empty custom example is used verbatim for the
/// custom format; the gherkin format takes the caller's example or the
/// literal fallback; everything else gets the per-language default block.
/// Pure function — no side effects.
pub fn build_instruction(
    requirement: &str,
    format: TestCaseFormat,
    context: &str,
    example_case: &str,
) -> String {
    let language = detect_language(&format!("{context} {requirement}"));

    let default_example = match language {
        Language::English => ENGLISH_DEFAULT_EXAMPLE,
        Language::French => FRENCH_DEFAULT_EXAMPLE,
    };

    let example_format = match format {
        TestCaseFormat::Custom if !example_case.trim().is_empty() => example_case,
        TestCaseFormat::Gherkin => {
            if example_case.trim().is_empty() {
                GHERKIN_FALLBACK
            } else {
                example_case
            }
        }
        _ => default_example,
    };

    let context_line = if context.is_empty() {
        String::new()
    } else {
        format!("Functional context: {context}")
    };

    format!(
        "\nGenerate test cases for the following requirement using the specified format.\n\
         {context_line}\n\
         Requirement: {requirement}\n\
         Format:\n\
         {example_format}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRENCH_REQUIREMENT: &str =
        "L'utilisateur doit pouvoir se connecter avec son adresse e-mail et son mot de passe.";
    const ENGLISH_REQUIREMENT: &str =
        "The user must be able to log in with a valid email address and password.";

    #[test]
    fn test_french_input_selects_french_template() {
        let instruction =
            build_instruction(FRENCH_REQUIREMENT, TestCaseFormat::Default, "", "");
        assert!(instruction.contains("**Cas fonctionnels**"));
        assert!(!instruction.contains("**Functional Test Cases**"));
    }

    #[test]
    fn test_english_input_selects_english_template() {
        let instruction =
            build_instruction(ENGLISH_REQUIREMENT, TestCaseFormat::Default, "", "");
        assert!(instruction.contains("**Functional Test Cases**"));
        assert!(!instruction.contains("**Cas fonctionnels**"));
    }

    #[test]
    fn test_detection_failure_defaults_to_french() {
        assert_eq!(detect_language("1234 #!"), Language::French);
    }

    #[test]
    fn test_custom_example_used_verbatim() {
        let instruction = build_instruction(
            ENGLISH_REQUIREMENT,
            TestCaseFormat::Custom,
            "",
            "My bespoke example block",
        );
        assert!(instruction.contains("My bespoke example block"));
        assert!(!instruction.contains("**Functional Test Cases**"));
    }

    #[test]
    fn test_custom_with_empty_example_falls_back_to_default() {
        let instruction =
            build_instruction(ENGLISH_REQUIREMENT, TestCaseFormat::Custom, "", "   ");
        assert!(instruction.contains("**Functional Test Cases**"));
    }

    #[test]
    fn test_gherkin_fallback_and_override() {
        let fallback = build_instruction(ENGLISH_REQUIREMENT, TestCaseFormat::Gherkin, "", "");
        assert!(fallback.contains("Gherkin format"));

        let overridden = build_instruction(
            ENGLISH_REQUIREMENT,
            TestCaseFormat::Gherkin,
            "",
            "Given / When / Then sample",
        );
        assert!(overridden.contains("Given / When / Then sample"));
        assert!(!overridden.contains("Gherkin format"));
    }

    #[test]
    fn test_context_included_when_present() {
        let instruction = build_instruction(
            ENGLISH_REQUIREMENT,
            TestCaseFormat::Default,
            "Checkout flow of the web shop",
            "",
        );
        assert!(instruction.contains("Functional context: Checkout flow of the web shop"));

        let without = build_instruction(ENGLISH_REQUIREMENT, TestCaseFormat::Default, "", "");
        assert!(!without.contains("Functional context:"));
    }

    #[test]
    fn test_unknown_format_selector_maps_to_default() {
        assert_eq!(TestCaseFormat::from("bdd"), TestCaseFormat::Default);
        assert_eq!(TestCaseFormat::from("gherkin"), TestCaseFormat::Gherkin);
        assert_eq!(TestCaseFormat::from("custom"), TestCaseFormat::Custom);
    }
}
