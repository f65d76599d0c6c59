/// Pull the JSON object out of raw model output.
///
/// Models often wrap the object in a Markdown fence or surround it with a
/// sentence of prose. This strips the first fenced block, if any, then cuts
/// from the first `{` to the last `}`. Text without a plausible object is
/// returned trimmed so the validator can report it as malformed.
pub fn extract_json_object(raw: &str) -> &str {
    let trimmed = raw.trim();
    let candidate = fenced_block(trimmed).unwrap_or(trimmed);

    match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if end > start => &candidate[start..=end],
        _ => candidate,
    }
}

/// Body of the first ```-fenced block, without the info string.
fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after = &raw[open + 3..];
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}
