#[cfg(test)]
#[path = "tutorial_test.rs"]
mod tests;

/// The next step a new user should take, if any.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TutorialElement {
    NewConversation,
    Model,
    None,
}

impl TutorialElement {
    pub fn resolve(
        models_loaded: bool,
        model_selected: bool,
        conversation_count: usize,
    ) -> TutorialElement {
        if !models_loaded {
            return TutorialElement::None;
        }
        if !model_selected {
            return TutorialElement::Model;
        }
        if conversation_count == 0 {
            return TutorialElement::NewConversation;
        }

        return TutorialElement::None;
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TutorialElement::Model => {
                return Some("Pick a default model first with `ochat models use <NAME>`.")
            }
            TutorialElement::NewConversation => {
                return Some("Start your first conversation with `ochat conversations new`.")
            }
            TutorialElement::None => return None,
        }
    }
}
