/// Turns a display name into a lowercase, URL-safe token containing only
/// `[a-z0-9-]`. Runs of anything else collapse into a single hyphen; the
/// result never starts or ends with one.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    out
}

pub fn branch_slug(name: &str) -> String {
    slugify(name)
}

/// Course code is appended so two subjects sharing a name in different
/// departments still get distinct slugs.
pub fn subject_slug(name: &str, course_code: &str) -> String {
    slugify(&format!("{}-{}", name, course_code))
}

/// File slugs get a creation timestamp appended. Uniqueness is
/// probabilistic; file slugs are an auxiliary field, not a lookup key.
pub fn file_slug(file_name: &str, timestamp_millis: i64) -> String {
    slugify(&format!("{}-{}", file_name, timestamp_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_slugifies() {
        assert_eq!(
            branch_slug("Computer Science and Technology"),
            "computer-science-and-technology"
        );
    }

    #[test]
    fn subject_slug_includes_course_code() {
        assert_eq!(
            subject_slug("Engineering Chemistry", "CH 1101 N"),
            "engineering-chemistry-ch-1101-n"
        );
    }

    #[test]
    fn punctuation_collapses_to_single_hyphen() {
        assert_eq!(slugify("Signals & Systems (Part II)"), "signals-systems-part-ii");
    }

    #[test]
    fn no_leading_or_trailing_hyphens() {
        assert_eq!(slugify("  (Syllabus)  "), "syllabus");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn file_slug_appends_timestamp() {
        assert_eq!(
            file_slug("Unit 1 Notes.pdf", 1700000000000),
            "unit-1-notes-pdf-1700000000000"
        );
    }
}
