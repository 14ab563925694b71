/// Extra result methods
pub trait ResultExtra<T, E> {
  /// perform an effect on the Ok variant of the Result
  fn tap<F: FnMut(&T)>(self, f: F) -> Self;

  /// perform an effect on the Err variant of the Result
  fn tap_err<F: FnMut(&E)>(self, f: F) -> Self;
}

impl<T, E> ResultExtra<T, E> for Result<T, E> {
  fn tap<F: FnMut(&T)>(self, mut f: F) -> Self {
    self.map(|ok| {
          f(&ok);
          ok
        })
  }

  fn tap_err<F: FnMut(&E)>(self, mut f: F) -> Self {
    self.map_err(|err| {
          f(&err);
          err
        })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tap() {
    let mut effect = "none";

    Result::<(), ()>::Ok(())
      .tap(|_| effect = "ok")
      .ok();

    Result::<(), ()>::Err(())
      .tap(|_| panic!("dont call me"))
      .ok();

    assert_eq!(effect, "ok");
  }

  #[test]
  fn tap_err() {
    let mut effect = "none";

    Result::<(), ()>::Err(())
      .tap_err(|_| effect = "err")
      .ok();

    Result::<(), ()>::Ok(())
      .tap_err(|_| panic!("dont call me"))
      .ok();

    assert_eq!(effect, "err");
  }
}
