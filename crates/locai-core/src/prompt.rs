/// Wrap retrieved chunks (most relevant first) and the user's question into a
/// single prompt for the language model.
pub fn build_prompt<S: AsRef<str>>(chunks: &[S], question: &str) -> String {
    let context = chunks.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n\n");
    format!(
        "Here is some context about the user:\n\n{context}\n\n\
         You may not need to use this information to answer the question; \
         it's just to provide more context.\n\n\
         Here is the question: {question}"
    )
}
