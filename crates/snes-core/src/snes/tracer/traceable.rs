pub trait Traceable {
    /// Short component label, e.g. "CPU"
    fn trace_name(&self) -> &'static str;

    /// Current state, or `None` when there is nothing worth recording
    fn trace_state(&self) -> Option<String>;

    fn trace(&self) -> Option<String> {
        self.trace_state()
            .map(|state| format!("{} {}", self.trace_name(), state))
    }
}
