use vergen_gitcl::{Emitter, GitclBuilder};

// exposes VERGEN_GIT_SHA to /healthz
fn main() -> anyhow::Result<()> {
    let gitcl = GitclBuilder::default().sha(true).build()?;
    Emitter::default().add_instructions(&gitcl)?.emit()?;

    Ok(())
}
