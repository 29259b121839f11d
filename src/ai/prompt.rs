// src/ai/prompt.rs

use super::{GenerationPrompt, MarkingRequest};

pub fn generation_system_prompt() -> String {
    "You are an experienced GCSE and A-level physics examiner writing exam-style questions. \
     Write Markdown and put all mathematics in LaTeX between $...$ (inline) or $$...$$ (display). \
     Return ONLY a JSON object with the keys \
     \"title\" (short label, e.g. \"Forces: resultant force\"), \
     \"question_text\" (the full question), \
     \"mark_scheme\" (numbered marking points, one mark each), \
     \"max_marks\" (integer)."
        .to_string()
}

pub fn generation_user_prompt(prompt: &GenerationPrompt) -> String {
    format!(
        "Subject: {}\nTopic: {}\nDifficulty: {}\nTotal marks: {}\n\
         Write one question worth exactly {} marks.",
        prompt.subject, prompt.topic, prompt.difficulty, prompt.max_marks, prompt.max_marks
    )
}

pub fn marking_system_prompt(request: &MarkingRequest) -> String {
    let scheme = match (&request.mark_scheme_text, &request.mark_scheme_image) {
        (Some(text), Some(_)) => format!("{}\n(The scanned mark scheme is also attached.)", text),
        (Some(text), None) => text.clone(),
        (None, Some(_)) => "See the attached mark scheme image.".to_string(),
        (None, None) => {
            "No mark scheme was provided; mark against standard GCSE physics expectations."
                .to_string()
        }
    };

    format!(
        "You are a GCSE Examiner. Mark strictly. The question is worth {} marks. \
         Return ONLY JSON with the keys \"marks_awarded\" (integer from 0 to {}), \
         \"summary\" (one or two sentences of feedback for the student) and \
         \"feedback_points\" (array of short strings, one per marking point). \
         Scheme: {}",
        request.max_marks, request.max_marks, scheme
    )
}

/// Text that introduces each part of the student's response.
pub fn marking_question_intro(request: &MarkingRequest) -> String {
    match &request.question_text {
        Some(text) => format!("Question:\n{}", text),
        None => "Question: see the attached question image.".to_string(),
    }
}

pub fn marking_answer_intro(request: &MarkingRequest) -> String {
    let typed = request
        .answer_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    match (typed, request.drawing.is_some()) {
        (Some(text), true) => format!(
            "Student Answer: {}\nThe student's handwritten working is attached as the last image. Mark this image together with the typed answer.",
            text
        ),
        (Some(text), false) => format!("Student Answer: {}", text),
        (None, true) => "Mark this image. It is the student's handwritten answer.".to_string(),
        (None, false) => "The student submitted no answer.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ImageInput;

    fn image() -> ImageInput {
        ImageInput {
            bytes: vec![1],
            content_type: "image/png".into(),
        }
    }

    #[test]
    fn marking_prompt_embeds_scheme_and_marks() {
        let request = MarkingRequest {
            mark_scheme_text: Some("1. F = ma".into()),
            max_marks: 3,
            ..Default::default()
        };
        let prompt = marking_system_prompt(&request);
        assert!(prompt.contains("worth 3 marks"));
        assert!(prompt.contains("Scheme: 1. F = ma"));
    }

    #[test]
    fn scanned_scheme_is_referenced() {
        let request = MarkingRequest {
            mark_scheme_image: Some(image()),
            max_marks: 2,
            ..Default::default()
        };
        assert!(marking_system_prompt(&request).contains("attached mark scheme image"));
    }

    #[test]
    fn answer_intro_covers_drawing_and_text() {
        let request = MarkingRequest {
            answer_text: Some("a = 3.2".into()),
            drawing: Some(image()),
            ..Default::default()
        };
        let intro = marking_answer_intro(&request);
        assert!(intro.contains("a = 3.2"));
        assert!(intro.contains("handwritten"));
    }
}
