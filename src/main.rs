use polltrace::error::AppResult;

fn main() -> AppResult<()> {
    polltrace::entry::run()
}
